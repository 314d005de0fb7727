use log::{debug, warn};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    Geographic, // lat/lon in degrees
    Projected,  // planar, linear units
    Unknown,
}

/// Coordinate reference system identifier, kept as given
/// (`"epsg:26911"`, WKT, or a PROJ string)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs(String);

impl Crs {
    pub fn new(definition: impl Into<String>) -> Self {
        Self(definition.into())
    }

    pub fn from_epsg(code: u32) -> Self {
        Self(format!("epsg:{}", code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// EPSG code from `epsg:N` or the outermost `AUTHORITY["EPSG","N"]` of a WKT string
    pub fn epsg(&self) -> Option<u32> {
        let def = self.0.trim();

        if let Some((prefix, code)) = def.split_once(':') {
            if prefix.eq_ignore_ascii_case("epsg") {
                return code.trim().parse().ok();
            }
        }

        // In WKT1 the CRS's own authority is the last one in the string
        let upper = def.to_ascii_uppercase();
        let idx = upper.rfind("AUTHORITY[\"EPSG\"")?;
        let rest = &def[idx + "AUTHORITY[\"EPSG\"".len()..];
        let code: String = rest
            .trim_start_matches(|c: char| c == ',' || c == '"' || c.is_whitespace())
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        code.parse().ok()
    }

    /// Detect whether the CRS is geographic or projected
    #[cfg(feature = "gdal")]
    pub fn kind(&self) -> CrsKind {
        use gdal::spatial_ref::SpatialRef;

        match SpatialRef::from_definition(&self.0) {
            Ok(sr) if sr.is_geographic() => CrsKind::Geographic,
            Ok(sr) if sr.is_projected() => CrsKind::Projected,
            Ok(_) => CrsKind::Unknown,
            Err(e) => {
                warn!("Failed to parse CRS '{}', falling back to EPSG lookup: {}", self.0, e);
                self.kind_from_epsg()
            }
        }
    }

    /// Detect whether the CRS is geographic or projected
    #[cfg(not(feature = "gdal"))]
    pub fn kind(&self) -> CrsKind {
        self.kind_from_epsg()
    }

    fn kind_from_epsg(&self) -> CrsKind {
        match self.epsg() {
            // EPSG reserves 4000-4999 for geographic 2D/3D systems
            Some(code) if (4000..5000).contains(&code) => CrsKind::Geographic,
            Some(code) => {
                debug!("Treating EPSG:{} as projected", code);
                CrsKind::Projected
            }
            None => {
                if self.0.trim_start().starts_with("GEOGCS") {
                    CrsKind::Geographic
                } else if self.0.trim_start().starts_with("PROJCS") {
                    CrsKind::Projected
                } else {
                    warn!("Unknown CRS type for '{}'", self.0);
                    CrsKind::Unknown
                }
            }
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Crs {
    fn from(s: &str) -> Self {
        Crs::new(s)
    }
}

impl From<String> for Crs {
    fn from(s: String) -> Self {
        Crs(s)
    }
}
