#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod class;
pub mod routing;
pub mod rules;
pub mod tags;

pub use self::{
    class::{Catalog, LatencyTarget, SloClass, UnknownClass},
    routing::Route,
    rules::{GenerateRules, MultiWindow, Slo},
};

/// Resolves the SLO class declared by a raw tags annotation.
///
/// Returns `Ok(None)` when no tag declares a class (or the declaring tag has no
/// value) and an error when the declared class is not in the catalog.
pub fn classify<'c>(
    tags: Option<&str>,
    catalog: &'c Catalog,
) -> Result<Option<&'c SloClass>, UnknownClass> {
    let tags = tags::split(tags);
    match tags::class_token(tags.iter().copied()) {
        Some(token) => catalog.find(&token.to_lowercase()).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_declared_class() {
        let catalog = Catalog::default();
        let class = classify(Some("foo,slo:high,slo=low"), &catalog)
            .expect("class must be known")
            .expect("class must be declared");
        assert_eq!(class.name, "high");
    }

    #[test]
    fn lowercases_before_lookup() {
        let catalog = Catalog::default();
        let class = classify(Some("SLO:Critical_Fast"), &catalog)
            .unwrap()
            .unwrap();
        assert_eq!(class.name, "critical_fast");
    }

    #[test]
    fn unclassified() {
        let catalog = Catalog::default();
        assert_eq!(classify(None, &catalog), Ok(None));
        assert_eq!(classify(Some(""), &catalog), Ok(None));
        assert_eq!(classify(Some("foo,bar"), &catalog), Ok(None));
        assert_eq!(classify(Some("slo:"), &catalog), Ok(None));
    }

    #[test]
    fn unknown_class() {
        let catalog = Catalog::default();
        assert_eq!(
            classify(Some("slo:doesnotexist"), &catalog),
            Err(UnknownClass("doesnotexist".to_string()))
        );
    }

    #[test]
    fn only_first_declaring_tag_counts() {
        let catalog = Catalog::default();
        // The first matching tag is invalid; later valid tags are not consulted.
        assert!(classify(Some("slo:nope,slo:high"), &catalog).is_err());
        // The first matching tag is empty; later tags are not consulted.
        assert_eq!(classify(Some("slo=,slo:high"), &catalog), Ok(None));
    }
}
