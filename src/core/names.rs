//! Package name normalization
//!
//! Build requirements are often virtual provides (`pkgconfig(glib-2.0)`,
//! `python3dist(requests)`) or contain RPM macros. [`RuleNormalizer`]
//! turns them into the name of a real package with a fixed rule set;
//! anything it does not recognize is passed through unchanged.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use regex::{Captures, Regex};

use crate::core::collaborators::NameNormalizer;

/// Values for the RPM macros commonly found in requirement names
const SYSTEM_MACROS: &[(&str, &str)] = &[
    ("python3_pkgversion", "3"),
    ("python3_version", "3.12"),
    ("python3_version_nodots", "312"),
    ("__python3", "/usr/bin/python3"),
    ("python3_sitelib", "/usr/lib/python3.12/site-packages"),
    ("python3_sitearch", "/usr/lib64/python3.12/site-packages"),
    ("lua_version", "5.4"),
    ("ruby_version", "3.2"),
    ("_prefix", "/usr"),
    ("_bindir", "/usr/bin"),
    ("_libdir", "/usr/lib64"),
    ("_includedir", "/usr/include"),
    ("_datadir", "/usr/share"),
    ("_sysconfdir", "/etc"),
    ("_mandir", "/usr/share/man"),
    ("_infodir", "/usr/share/info"),
    ("_localstatedir", "/var"),
    ("_sharedstatedir", "/var/lib"),
];

type Rewrite = fn(&Captures<'_>) -> String;

fn provide_rules() -> &'static [(Regex, Rewrite)] {
    static RULES: OnceLock<Vec<(Regex, Rewrite)>> = OnceLock::new();
    RULES.get_or_init(|| {
        let table: [(&str, Rewrite); 9] = [
            (r"^python(\d*)dist\((.+)\)$", |c| {
                let major = if c[1].is_empty() { "3" } else { &c[1] };
                format!("python{major}-{}", &c[2])
            }),
            (r"^pkgconfig\((.+)\)$", |c| format!("{}-devel", &c[1])),
            (r"^perl\((.+)\)$", |c| format!("perl-{}", c[1].replace("::", "-"))),
            (r"^rubygem\((.+)\)$", |c| format!("rubygem-{}", &c[1])),
            (r"^npm\((.+)\)$", |c| format!("nodejs-{}", &c[1])),
            (r"^cmake\((.+)\)$", |c| format!("cmake-{}", c[1].to_lowercase())),
            (r"^tex\((.+)\)$", |c| format!("texlive-{}", &c[1])),
            (r"^golang\((.+)\)$", |c| format!("golang-{}", c[1].replace('/', "-"))),
            (r"^mvn\(([^:]+):([^:]+)\)$", |c| c[2].to_string()),
        ];
        table
            .into_iter()
            .map(|(pattern, rewrite)| (Regex::new(pattern).expect("valid regex"), rewrite))
            .collect()
    })
}

fn macro_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"%\{([^}]+)\}").expect("valid regex"))
}

fn system_macro(name: &str) -> Option<&'static str> {
    SYSTEM_MACROS
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// Expand known RPM macros
///
/// `%{name}` expands to its value or stays as is; `%{?name}` expands to its
/// value or nothing; `%{?name:default}` falls back to `default`.
pub fn expand_macros(name: &str) -> String {
    if !name.contains('%') {
        return name.to_string();
    }
    macro_pattern()
        .replace_all(name, |caps: &Captures<'_>| {
            let expr = &caps[1];
            match expr.strip_prefix('?') {
                Some(conditional) => {
                    let (key, default) = conditional.split_once(':').unwrap_or((conditional, ""));
                    system_macro(key).unwrap_or(default).to_string()
                }
                None => system_macro(expr).map_or_else(|| caps[0].to_string(), ToString::to_string),
            }
        })
        .into_owned()
}

/// Rewrite a virtual provide into a package name, if a rule matches
pub fn resolve_virtual_provide(name: &str) -> Option<String> {
    provide_rules()
        .iter()
        .find_map(|(pattern, rewrite)| pattern.captures(name).map(|caps| rewrite(&caps)))
}

/// Candidate source package names for a binary package name, most likely first
pub fn srpm_candidates(rpm_name: &str) -> Vec<String> {
    let stripped = ["python3-", "python2-"]
        .iter()
        .find_map(|prefix| rpm_name.strip_prefix(prefix))
        .map(|base| format!("python-{base}"))
        .or_else(|| {
            ["-devel", "-libs"]
                .iter()
                .find_map(|suffix| rpm_name.strip_suffix(suffix))
                .map(ToString::to_string)
        });

    let mut candidates = Vec::with_capacity(2);
    if let Some(base) = stripped {
        candidates.push(base);
    }
    if !candidates.iter().any(|c| c == rpm_name) {
        candidates.push(rpm_name.to_string());
    }
    candidates
}

/// Rule-based normalizer with a per-instance cache
#[derive(Debug, Default)]
pub struct RuleNormalizer {
    cache: Mutex<HashMap<String, String>>,
}

impl RuleNormalizer {
    /// Create a normalizer with an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(raw: &str) -> String {
        let expanded = expand_macros(raw.trim());
        match resolve_virtual_provide(&expanded) {
            Some(resolved) => {
                tracing::debug!("Resolved '{raw}' -> '{resolved}'");
                resolved
            }
            None => expanded,
        }
    }
}

impl NameNormalizer for RuleNormalizer {
    fn normalize(&self, raw: &str) -> String {
        if raw.is_empty() {
            return String::new();
        }
        let Ok(mut cache) = self.cache.lock() else {
            return Self::resolve(raw);
        };
        cache
            .entry(raw.to_string())
            .or_insert_with(|| Self::resolve(raw))
            .clone()
    }
}

/// Normalizer that leaves names untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl NameNormalizer for PassThrough {
    fn normalize(&self, raw: &str) -> String {
        raw.trim().to_string()
    }
}
