//! Tier-ordered check dispatch.
//!
//! Checks are registered against a [`CheckRegistry`] — an explicit object
//! passed by reference wherever it is needed, never global state — each
//! tagged with a tier, an optional applicable-package-type filter, and an
//! optional supported-application-version constraint. [`CheckRegistry::run_tiers`]
//! walks tiers in ascending order and stops early when a tier fails on an
//! undetermined bundle.

use crate::archive::ArchiveReader;
use crate::bundle::ErrorBundle;
use crate::detect::PackageType;

/// The package a check is currently examining.
pub struct PackageData<'a> {
    /// Archive access for extracting entry bytes.
    pub archive: &'a mut dyn ArchiveReader,
    /// Cached entry listing, sorted.
    pub contents: Vec<String>,
    /// Display name of the package (file name or nested entry path).
    pub name: String,
    /// Lower-cased file extension without the dot.
    pub extension: String,
}

impl<'a> PackageData<'a> {
    /// Builds package data from an archive, caching its entry listing.
    pub fn new(archive: &'a mut dyn ArchiveReader, name: impl Into<String>) -> Self {
        let name = name.into();
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            contents: archive.entries(),
            archive,
            name,
            extension,
        }
    }
}

/// A validation check. Checks record findings on the bundle and return
/// normally; they never raise.
pub type Check = Box<dyn Fn(&mut ErrorBundle, &mut PackageData<'_>, &CheckRegistry)>;

struct RegisteredCheck {
    tier: u8,
    applies_to: Option<Vec<PackageType>>,
    supported_versions: Option<Vec<String>>,
    run: Check,
}

impl RegisteredCheck {
    fn matches(&self, bundle: &ErrorBundle) -> bool {
        if let Some(types) = &self.applies_to
            && !types.contains(&bundle.detected_type())
        {
            return false;
        }
        match (&self.supported_versions, bundle.supported_versions()) {
            (Some(required), Some(declared)) => {
                required.iter().any(|version| declared.contains(version))
            }
            _ => true,
        }
    }
}

/// Ordered registry of checks. Registration order within a tier is the
/// execution order.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<RegisteredCheck>,
}

impl CheckRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-loaded with the built-in checks.
    #[must_use]
    pub fn with_builtin_checks() -> Self {
        let mut registry = Self::new();
        crate::checks::register_builtin_checks(&mut registry);
        registry
    }

    /// Registers a check that runs for every package type.
    pub fn register(
        &mut self,
        tier: u8,
        check: impl Fn(&mut ErrorBundle, &mut PackageData<'_>, &Self) + 'static,
    ) -> &mut Self {
        self.register_filtered(tier, None, None, check)
    }

    /// Registers a check limited to the given package types.
    pub fn register_for_types(
        &mut self,
        tier: u8,
        types: &[PackageType],
        check: impl Fn(&mut ErrorBundle, &mut PackageData<'_>, &Self) + 'static,
    ) -> &mut Self {
        self.register_filtered(tier, Some(types.to_vec()), None, check)
    }

    /// Registers a check with explicit type and version filters.
    pub fn register_filtered(
        &mut self,
        tier: u8,
        applies_to: Option<Vec<PackageType>>,
        supported_versions: Option<Vec<String>>,
        check: impl Fn(&mut ErrorBundle, &mut PackageData<'_>, &Self) + 'static,
    ) -> &mut Self {
        self.checks.push(RegisteredCheck {
            tier,
            applies_to,
            supported_versions,
            run: Box::new(check),
        });
        self
    }

    /// Number of registered checks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// The distinct tiers present, ascending.
    #[must_use]
    pub fn tiers(&self) -> Vec<u8> {
        let mut tiers: Vec<u8> = self.checks.iter().map(|check| check.tier).collect();
        tiers.sort_unstable();
        tiers.dedup();
        tiers
    }

    /// Runs every matching check tier by tier against the package.
    ///
    /// After each tier, an undetermined bundle that has accumulated errors
    /// stops the walk: the bundle is marked unfinished and no later tier
    /// runs. Determined bundles always reach the final tier.
    pub fn run_tiers(&self, bundle: &mut ErrorBundle, package: &mut PackageData<'_>) {
        for tier in self.tiers() {
            bundle.set_tier(tier);
            log::debug!("running tier {tier} for {}", package.name);

            for check in self.checks.iter().filter(|check| check.tier == tier) {
                if check.matches(bundle) {
                    (check.run)(bundle, package, self);
                }
            }

            if bundle.failed(false) && !bundle.is_determined() {
                bundle.mark_unfinished();
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;
    use std::cell::Cell;
    use std::rc::Rc;

    fn run(registry: &CheckRegistry, bundle: &mut ErrorBundle) {
        let mut archive = MemoryArchive::new();
        let mut package = PackageData::new(&mut archive, "test.xpi");
        registry.run_tiers(bundle, &mut package);
    }

    #[test]
    fn package_data_extracts_the_extension() {
        let mut archive = MemoryArchive::new();
        let package = PackageData::new(&mut archive, "Addon.XPI");
        assert_eq!(package.extension, "xpi");
    }

    #[test]
    fn runs_tiers_in_ascending_order() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut registry = CheckRegistry::new();
        for tier in [2_u8, 1, 3] {
            let order = Rc::clone(&order);
            registry.register(tier, move |bundle, _, _| {
                order.borrow_mut().push((tier, bundle.tier()));
            });
        }

        let mut bundle = ErrorBundle::new(true);
        run(&registry, &mut bundle);
        assert_eq!(*order.borrow(), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn registration_order_is_execution_order_within_a_tier() {
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut registry = CheckRegistry::new();
        for label in ["first", "second", "third"] {
            let order = Rc::clone(&order);
            registry.register(1, move |_, _, _| order.borrow_mut().push(label));
        }

        let mut bundle = ErrorBundle::new(true);
        run(&registry, &mut bundle);
        assert_eq!(*order.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn tier_failure_short_circuits_undetermined_bundles() {
        let later_ran = Rc::new(Cell::new(false));
        let mut registry = CheckRegistry::new();
        registry.register(1, |bundle, _, _| {
            bundle.error(["tier1"], "broken").emit();
        });
        let flag = Rc::clone(&later_ran);
        registry.register(2, move |_, _, _| flag.set(true));

        let mut bundle = ErrorBundle::new(false);
        run(&registry, &mut bundle);
        assert!(!later_ran.get());
        assert!(bundle.unfinished());
    }

    #[test]
    fn determined_bundles_run_every_tier_despite_failures() {
        let later_ran = Rc::new(Cell::new(false));
        let mut registry = CheckRegistry::new();
        registry.register(1, |bundle, _, _| {
            bundle.error(["tier1"], "broken").emit();
        });
        let flag = Rc::clone(&later_ran);
        registry.register(2, move |_, _, _| flag.set(true));

        let mut bundle = ErrorBundle::new(true);
        run(&registry, &mut bundle);
        assert!(later_ran.get());
        assert!(!bundle.unfinished());
    }

    #[test]
    fn warnings_do_not_short_circuit() {
        let later_ran = Rc::new(Cell::new(false));
        let mut registry = CheckRegistry::new();
        registry.register(1, |bundle, _, _| {
            bundle.warning(["tier1"], "advisory").emit();
        });
        let flag = Rc::clone(&later_ran);
        registry.register(2, move |_, _, _| flag.set(true));

        let mut bundle = ErrorBundle::new(false);
        run(&registry, &mut bundle);
        assert!(later_ran.get());
    }

    #[test]
    fn type_filter_excludes_other_package_types() {
        let ran = Rc::new(Cell::new(false));
        let mut registry = CheckRegistry::new();
        let flag = Rc::clone(&ran);
        registry.register_for_types(1, &[PackageType::Dictionary], move |_, _, _| {
            flag.set(true);
        });

        let mut bundle = ErrorBundle::new(true);
        bundle.set_type(PackageType::Extension);
        run(&registry, &mut bundle);
        assert!(!ran.get());

        bundle.set_type(PackageType::Dictionary);
        run(&registry, &mut bundle);
        assert!(ran.get());
    }

    #[test]
    fn version_constraints_require_an_intersection() {
        let ran = Rc::new(Cell::new(0_u32));
        let mut registry = CheckRegistry::new();
        let counter = Rc::clone(&ran);
        registry.register_filtered(
            1,
            None,
            Some(vec!["4.0".to_owned()]),
            move |_, _, _| counter.set(counter.get() + 1),
        );

        // No declared versions: the constraint does not apply.
        let mut bundle = ErrorBundle::new(true);
        run(&registry, &mut bundle);
        assert_eq!(ran.get(), 1);

        // Disjoint versions: skipped.
        let mut bundle = ErrorBundle::new(true);
        bundle.set_supported_versions(vec!["3.6".to_owned()]);
        run(&registry, &mut bundle);
        assert_eq!(ran.get(), 1);

        // Overlapping versions: runs.
        let mut bundle = ErrorBundle::new(true);
        bundle.set_supported_versions(vec!["3.6".to_owned(), "4.0".to_owned()]);
        run(&registry, &mut bundle);
        assert_eq!(ran.get(), 2);
    }
}
