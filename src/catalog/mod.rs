mod error;
mod snapshot;
mod tle_loader;
mod types;

pub use error::CatalogError;
pub use snapshot::Catalog;
pub use tle_loader::{parse_tle_text, TleLoader};
pub use types::{ObjectSummary, OrbitalObject};

#[cfg(test)]
pub(crate) mod test_objects {
    use super::{parse_tle_text, OrbitalObject};

    pub const ZARYA_TLE: &str = "ISS (ZARYA)
1 25544U 98067A   25335.57620886  .00008648  00000+0  16366-3 0  9990
2 25544  51.6309 197.7449 0003647 190.9481 169.1428 15.49226524541123";

    // Same element set as Zarya: the two modules fly docked.
    pub const NAUKA_TLE: &str = "ISS (NAUKA)
1 49044U 21066A   25335.57620886  .00008648  00000+0  16366-3 0  9996
2 49044  51.6309 197.7449 0003647 190.9481 169.1428 15.49226524230444";

    fn single(tle: &str) -> OrbitalObject {
        parse_tle_text(tle, "test.tle")
            .unwrap()
            .pop()
            .unwrap()
    }

    pub fn iss_zarya() -> OrbitalObject {
        single(ZARYA_TLE)
    }

    pub fn iss_nauka() -> OrbitalObject {
        single(NAUKA_TLE)
    }
}
