//! Which IR snapshots get dumped, and where.
//!
//! Dumping is configured per process through three environment variables:
//!
//! | Variable                    | Meaning                                          |
//! |-----------------------------|--------------------------------------------------|
//! | `TF_DUMP_GRAPH_PREFIX`      | output directory; unset disables dumping         |
//! | `TF_DUMP_GRAPH_NAME_FILTER` | `*` or a substring of the module name; unset disables dumping |
//! | `TF_DUMP_GRAPH_GROUPS`      | comma separated groups, `*` for all (default `main`) |
//!
//! Files are named `<prefix>/<name>.<NNNN>.<group>.<tag>.mlir`, where `NNNN`
//! counts the dumps made for that module name.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use parking_lot::Mutex;

/// Group of the before/after snapshots of the whole conversion.
pub const MAIN_GROUP: &str = "main";
/// Group of the per-pass snapshots.
pub const PHASE1_GROUP: &str = "bridge_phase1";

/// Decides whether snapshots are wanted and names their files.
pub trait DumpRegistry {
    /// Whether `group` is active for the module called `module_name`.
    fn should_dump(&self, module_name: &str, group: &str) -> bool;

    /// File for the next snapshot of `module_name`, or `None` when no dump
    /// location is configured.
    fn dump_filename(&self, module_name: &str, group: &str, tag: &str) -> Option<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Groups {
    All,
    Only(BTreeSet<String>),
}

impl Groups {
    fn parse(spec: &str) -> Self {
        let names: BTreeSet<String> = spec
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect();
        if names.contains("*") {
            Groups::All
        } else {
            Groups::Only(names)
        }
    }

    fn contains(&self, group: &str) -> bool {
        match self {
            Groups::All => true,
            Groups::Only(names) => names.contains(group),
        }
    }
}

/// The environment-configured [`DumpRegistry`].
#[derive(Debug)]
pub struct DebugDataDumper {
    prefix: Option<PathBuf>,
    name_filter: Option<String>,
    groups: Groups,
    counters: Mutex<HashMap<String, u32>>,
}

impl DebugDataDumper {
    pub const PREFIX_ENV: &'static str = "TF_DUMP_GRAPH_PREFIX";
    pub const NAME_FILTER_ENV: &'static str = "TF_DUMP_GRAPH_NAME_FILTER";
    pub const GROUPS_ENV: &'static str = "TF_DUMP_GRAPH_GROUPS";

    /// `groups` is a comma separated list; `None` selects `main` only.
    pub fn new(prefix: Option<PathBuf>, name_filter: Option<String>, groups: Option<&str>) -> Self {
        Self {
            prefix,
            name_filter,
            groups: Groups::parse(groups.unwrap_or(MAIN_GROUP)),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// A dumper that never dumps.
    pub fn disabled() -> Self {
        Self::new(None, None, None)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let prefix = lookup(Self::PREFIX_ENV)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let name_filter = lookup(Self::NAME_FILTER_ENV).filter(|f| !f.is_empty());
        let groups = lookup(Self::GROUPS_ENV);
        Self::new(prefix, name_filter, groups.as_deref())
    }

    fn name_matches(&self, module_name: &str) -> bool {
        match self.name_filter.as_deref() {
            Some("*") => true,
            Some(filter) => module_name.contains(filter),
            None => false,
        }
    }
}

/// The module name as used in file names.
fn file_stem(module_name: &str) -> String {
    if module_name.is_empty() {
        return "anonymous".to_owned();
    }
    module_name
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

impl DumpRegistry for DebugDataDumper {
    fn should_dump(&self, module_name: &str, group: &str) -> bool {
        self.prefix.is_some() && self.name_matches(module_name) && self.groups.contains(group)
    }

    fn dump_filename(&self, module_name: &str, group: &str, tag: &str) -> Option<PathBuf> {
        let prefix = self.prefix.as_ref()?;
        let stem = file_stem(module_name);
        let index = {
            let mut counters = self.counters.lock();
            let counter = counters.entry(stem.clone()).or_insert(0);
            let index = *counter;
            *counter += 1;
            index
        };
        Some(prefix.join(format!("{stem}.{index:04}.{group}.{tag}.mlir")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn dumper(vars: &[(&str, &str)]) -> DebugDataDumper {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        DebugDataDumper::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn unset_prefix_or_filter_disables_everything() {
        let no_prefix = dumper(&[("TF_DUMP_GRAPH_NAME_FILTER", "*")]);
        assert!(!no_prefix.should_dump("train", MAIN_GROUP));
        assert_eq!(no_prefix.dump_filename("train", MAIN_GROUP, "before"), None);

        let no_filter = dumper(&[("TF_DUMP_GRAPH_PREFIX", "/tmp/dumps")]);
        assert!(!no_filter.should_dump("train", MAIN_GROUP));
    }

    #[test]
    fn groups_and_name_filter_select_dumps() {
        let d = dumper(&[
            ("TF_DUMP_GRAPH_PREFIX", "/tmp/dumps"),
            ("TF_DUMP_GRAPH_NAME_FILTER", "train"),
        ]);
        assert!(d.should_dump("my_train_step", MAIN_GROUP));
        assert!(!d.should_dump("my_train_step", PHASE1_GROUP));
        assert!(!d.should_dump("eval", MAIN_GROUP));

        let all = dumper(&[
            ("TF_DUMP_GRAPH_PREFIX", "/tmp/dumps"),
            ("TF_DUMP_GRAPH_NAME_FILTER", "*"),
            ("TF_DUMP_GRAPH_GROUPS", "main, *"),
        ]);
        assert!(all.should_dump("eval", PHASE1_GROUP));

        let phase1 = dumper(&[
            ("TF_DUMP_GRAPH_PREFIX", "/tmp/dumps"),
            ("TF_DUMP_GRAPH_NAME_FILTER", "*"),
            ("TF_DUMP_GRAPH_GROUPS", "bridge_phase1"),
        ]);
        assert!(phase1.should_dump("eval", PHASE1_GROUP));
        assert!(!phase1.should_dump("eval", MAIN_GROUP));
    }

    #[test]
    fn file_names_count_per_module() {
        let d = DebugDataDumper::new(Some(PathBuf::from("/tmp/dumps")), Some("*".into()), None);
        let first = d.dump_filename("train", MAIN_GROUP, "before");
        let second = d.dump_filename("train", MAIN_GROUP, "after");
        let other = d.dump_filename("", MAIN_GROUP, "before");
        assert_eq!(first, Some(PathBuf::from("/tmp/dumps/train.0000.main.before.mlir")));
        assert_eq!(second, Some(PathBuf::from("/tmp/dumps/train.0001.main.after.mlir")));
        assert_eq!(other, Some(PathBuf::from("/tmp/dumps/anonymous.0000.main.before.mlir")));
    }
}
