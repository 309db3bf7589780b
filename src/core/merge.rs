// src/core/merge.rs

//! Folding one task into another.
//!
//! [`merge`] is used both to apply an inheritance parent (parent as base, child
//! as overlay) and to fold a selected flavor, optional or experimental feature
//! into the task declaring it (task as base, feature as overlay).
//!
//! Per-field policy:
//! - scalars: the overlay wins unless it holds the default value;
//! - sequences: the overlay's elements are appended, duplicates kept;
//! - maps: the overlay's entries overwrite entries with the same key. For
//!   multi-valued maps the overlay's variant list replaces the base's list.

use crate::models::{Description, MultiMap, Task, TaskFilters};
use std::collections::BTreeMap;

fn scalar<T: PartialEq + Default + Clone>(result: &mut T, overlay: &T) {
    if *overlay != T::default() {
        *result = overlay.clone();
    }
}

fn append<T: Clone>(result: &mut Vec<T>, overlay: &[T]) {
    result.extend_from_slice(overlay);
}

fn overwrite<V: Clone>(result: &mut BTreeMap<String, V>, overlay: &BTreeMap<String, V>) {
    for (key, value) in overlay {
        result.insert(key.clone(), value.clone());
    }
}

fn overwrite_variants<V: Clone>(result: &mut MultiMap<V>, overlay: &MultiMap<V>) {
    for (key, values) in overlay.groups() {
        result.replace(key.clone(), values.clone());
    }
}

fn merge_filters(result: &mut TaskFilters, overlay: &TaskFilters) {
    append(&mut result.archs, &overlay.archs);
    append(&mut result.platforms, &overlay.platforms);
    scalar(&mut result.min_tag, &overlay.min_tag);
    scalar(&mut result.max_tag, &overlay.max_tag);
}

fn merge_description(result: &mut Description, overlay: &Description) {
    scalar(&mut result.title, &overlay.title);
    scalar(&mut result.summary, &overlay.summary);
    scalar(&mut result.home, &overlay.home);
    scalar(&mut result.bugs, &overlay.bugs);
    scalar(&mut result.icon, &overlay.icon);
    append(&mut result.public_icons, &overlay.public_icons);
    overwrite(&mut result.licenses, &overlay.licenses);
}

/// Produces the effective task of `overlay` applied on top of `base`.
/// Neither input is modified.
pub fn merge(base: &Task, overlay: &Task) -> Task {
    let mut result = base.clone();

    scalar(&mut result.inherits, &overlay.inherits);
    scalar(&mut result.task_type, &overlay.task_type);
    merge_filters(&mut result.filters, &overlay.filters);
    append(&mut result.dependencies, &overlay.dependencies);
    overwrite_variants(&mut result.optionals, &overlay.optionals);
    overwrite_variants(&mut result.experimental, &overlay.experimental);
    overwrite_variants(&mut result.flavors, &overlay.flavors);
    append(&mut result.patches, &overlay.patches);
    scalar(&mut result.toolchain, &overlay.toolchain);
    append(&mut result.toolchain_flags, &overlay.toolchain_flags);
    scalar(&mut result.standard, &overlay.standard);
    scalar(&mut result.optimize, &overlay.optimize);
    append(&mut result.sources, &overlay.sources);
    append(&mut result.include_dirs, &overlay.include_dirs);
    append(&mut result.headers, &overlay.headers);
    overwrite(&mut result.symbols, &overlay.symbols);
    merge_description(&mut result.description, &overlay.description);

    result
}

impl Task {
    /// Shorthand for [`merge`] with `self` as the base.
    pub fn merged_with(&self, overlay: &Self) -> Self {
        merge(self, overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Optimization, TaskType};

    fn task_with_standard(standard: &str) -> Task {
        Task {
            standard: standard.to_string(),
            ..Task::default()
        }
    }

    #[test]
    fn test_default_overlay_keeps_base_scalars() {
        let base = task_with_standard("c++11");
        assert_eq!(merge(&base, &Task::default()).standard, "c++11");
    }

    #[test]
    fn test_overlay_scalar_overrides() {
        let base = task_with_standard("c++11");
        let overlay = task_with_standard("c++17");
        assert_eq!(merge(&base, &overlay).standard, "c++17");

        let base = Task {
            task_type: TaskType::Library,
            optimize: Optimization::Size,
            toolchain: "gcc".into(),
            ..Task::default()
        };
        let overlay = Task {
            optimize: Optimization::Speed,
            ..Task::default()
        };
        let merged = merge(&base, &overlay);
        assert_eq!(merged.task_type, TaskType::Library);
        assert_eq!(merged.optimize, Optimization::Speed);
        assert_eq!(merged.toolchain, "gcc");
    }

    #[test]
    fn test_sequences_are_appended_in_order() {
        let base = Task {
            sources: vec!["a.cpp".into()],
            dependencies: vec![Dependency {
                name: "zlib".into(),
                ..Dependency::default()
            }],
            ..Task::default()
        };
        let overlay = Task {
            sources: vec!["b.cpp".into(), "a.cpp".into()],
            dependencies: vec![Dependency {
                name: "zlib".into(),
                ..Dependency::default()
            }],
            ..Task::default()
        };
        let merged = merge(&base, &overlay);
        assert_eq!(merged.sources, vec!["a.cpp", "b.cpp", "a.cpp"]);
        assert_eq!(merged.dependencies.len(), 2);
    }

    #[test]
    fn test_maps_are_overwritten_by_key() {
        let base = Task {
            symbols: BTreeMap::from([
                ("DEBUG".to_string(), "0".to_string()),
                ("NAME".to_string(), "base".to_string()),
            ]),
            ..Task::default()
        };
        let overlay = Task {
            symbols: BTreeMap::from([("DEBUG".to_string(), "1".to_string())]),
            ..Task::default()
        };
        let merged = merge(&base, &overlay);
        assert_eq!(merged.symbols.get("DEBUG").map(String::as_str), Some("1"));
        assert_eq!(merged.symbols.get("NAME").map(String::as_str), Some("base"));
    }

    #[test]
    fn test_flavor_variants_replace_per_key() {
        let mut base = Task::default();
        base.flavors.insert("debug", task_with_standard("old"));
        base.flavors.insert("release", task_with_standard("keep"));
        let mut overlay = Task::default();
        overlay.flavors.insert("debug", task_with_standard("new"));

        let merged = merge(&base, &overlay);
        let debug = merged.flavors.get_all("debug");
        assert_eq!(debug.len(), 1);
        assert_eq!(debug.first().map(|t| t.standard.as_str()), Some("new"));
        assert_eq!(merged.flavors.get_all("release").len(), 1);
    }

    #[test]
    fn test_feature_variants_replace_per_key() {
        let mut base = Task::default();
        base.optionals.insert("ssl", task_with_standard("openssl"));
        base.optionals.insert("ssl", task_with_standard("libressl"));
        base.optionals.insert("zip", task_with_standard("zlib"));
        base.experimental.insert("simd", task_with_standard("sse"));
        let mut overlay = Task::default();
        overlay.optionals.insert("ssl", task_with_standard("rustls"));
        overlay.experimental.insert("gpu", task_with_standard("cuda"));

        let merged = merge(&base, &overlay);
        let ssl: Vec<&str> = merged
            .optionals
            .get_all("ssl")
            .iter()
            .map(|t| t.standard.as_str())
            .collect();
        assert_eq!(ssl, vec!["rustls"]);
        assert_eq!(merged.optionals.get_all("zip").len(), 1);
        assert_eq!(merged.experimental.get_all("simd").len(), 1);
        assert_eq!(
            merged
                .experimental
                .get_all("gpu")
                .first()
                .map(|t| t.standard.as_str()),
            Some("cuda")
        );
    }

    #[test]
    fn test_description_licenses_are_overwritten_by_key() {
        let base = Task {
            description: Description {
                licenses: BTreeMap::from([
                    ("MIT".to_string(), "LICENSE-MIT".to_string()),
                    ("Apache-2.0".to_string(), "LICENSE-APACHE".to_string()),
                ]),
                ..Description::default()
            },
            ..Task::default()
        };
        let overlay = Task {
            description: Description {
                licenses: BTreeMap::from([("MIT".to_string(), "COPYING".to_string())]),
                ..Description::default()
            },
            ..Task::default()
        };

        let licenses = merge(&base, &overlay).description.licenses;
        assert_eq!(licenses.len(), 2);
        assert_eq!(licenses.get("MIT").map(String::as_str), Some("COPYING"));
        assert_eq!(
            licenses.get("Apache-2.0").map(String::as_str),
            Some("LICENSE-APACHE")
        );
    }

    #[test]
    fn test_description_and_filters() {
        let base = Task {
            filters: TaskFilters {
                archs: vec!["x86_64".into()],
                min_tag: "v1".into(),
                ..TaskFilters::default()
            },
            description: Description {
                title: "Base".into(),
                summary: "kept".into(),
                public_icons: vec!["a.png".into()],
                ..Description::default()
            },
            ..Task::default()
        };
        let overlay = Task {
            filters: TaskFilters {
                archs: vec!["aarch64".into()],
                ..TaskFilters::default()
            },
            description: Description {
                title: "Overlay".into(),
                public_icons: vec!["b.png".into()],
                ..Description::default()
            },
            ..Task::default()
        };
        let merged = merge(&base, &overlay);
        assert_eq!(merged.filters.archs, vec!["x86_64", "aarch64"]);
        assert_eq!(merged.filters.min_tag, "v1");
        assert_eq!(merged.description.title, "Overlay");
        assert_eq!(merged.description.summary, "kept");
        assert_eq!(merged.description.public_icons, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_inputs_are_untouched() {
        let base = task_with_standard("c++11");
        let overlay = task_with_standard("c++20");
        let merged = base.merged_with(&overlay);
        assert_eq!(base.standard, "c++11");
        assert_eq!(overlay.standard, "c++20");
        assert_eq!(merged.standard, "c++20");
    }
}
