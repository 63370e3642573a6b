use std::fmt;

/// One known-safe traffic pattern: an optional origin prefix and an
/// optional destination prefix, compared against raw URI strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibilityRule {
    origin: Option<String>,
    dest: Option<String>,
    note: String,
}

impl CompatibilityRule {
    pub fn new(
        origin: Option<impl Into<String>>,
        dest: Option<impl Into<String>>,
        note: impl Into<String>,
    ) -> Self {
        Self {
            origin: origin.map(Into::into),
            dest: dest.map(Into::into),
            note: note.into(),
        }
    }

    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    #[must_use]
    pub fn dest(&self) -> Option<&str> {
        self.dest.as_deref()
    }

    /// What this rule exists for, e.g. the application or extension name.
    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    /// An absent prefix matches any URI on that side.
    #[must_use]
    pub fn matches(&self, origin_uri: &str, dest_uri: &str) -> bool {
        let origin_ok = self
            .origin
            .as_deref()
            .is_none_or(|prefix| origin_uri.starts_with(prefix));
        let dest_ok = self
            .dest
            .as_deref()
            .is_none_or(|prefix| dest_uri.starts_with(prefix));
        origin_ok && dest_ok
    }
}

impl fmt::Display for CompatibilityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({})",
            self.origin.as_deref().unwrap_or("*"),
            self.dest.as_deref().unwrap_or("*"),
            self.note,
        )
    }
}

/// A static, pre-loaded table of known-safe vendor and extension traffic,
/// checked after explicit rules but before the default policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompatibilityRules {
    entries: Vec<CompatibilityRule>,
}

impl CompatibilityRules {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table: browser update and add-on installation traffic
    /// that breaks silently when blocked.
    #[must_use]
    pub fn builtin() -> Self {
        let updates = "application update";
        let addons = "add-on installation";
        let entries = vec![
            CompatibilityRule::new(Some("http://download.mozilla.org/"), None::<&str>, updates),
            CompatibilityRule::new(Some("https://download.mozilla.org/"), None::<&str>, updates),
            CompatibilityRule::new(Some("http://addons.mozilla.org/"), None::<&str>, addons),
            CompatibilityRule::new(Some("https://addons.mozilla.org/"), None::<&str>, addons),
            CompatibilityRule::new(Some("http://releases.mozilla.org/"), None::<&str>, addons),
            CompatibilityRule::new(Some("https://releases.mozilla.org/"), None::<&str>, addons),
            CompatibilityRule::new(
                Some("about:addons"),
                Some("https://services.addons.mozilla.org/"),
                addons,
            ),
            CompatibilityRule::new(
                Some("about:addons"),
                Some("https://discovery.addons.mozilla.org/"),
                addons,
            ),
            CompatibilityRule::new(
                Some("https://services.addons.mozilla.org/"),
                Some("https://addons.mozilla.org/"),
                addons,
            ),
            CompatibilityRule::new(
                Some("https://services.addons.mozilla.org/"),
                Some("https://addons.cdn.mozilla.net/"),
                addons,
            ),
            CompatibilityRule::new(Some("about:home"), None::<&str>, "start page"),
            CompatibilityRule::new(Some("about:newtab"), None::<&str>, "new tab page"),
        ];
        Self { entries }
    }

    pub fn push(&mut self, rule: CompatibilityRule) {
        self.entries.push(rule);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompatibilityRule> {
        self.entries.iter()
    }

    /// The first entry matching the pair, if any.
    #[must_use]
    pub fn find_match(&self, origin_uri: &str, dest_uri: &str) -> Option<&CompatibilityRule> {
        self.entries
            .iter()
            .find(|rule| rule.matches(origin_uri, dest_uri))
    }
}
