use std::fmt;

/// A content line kept as text, for properties the pipeline doesn't interpret.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawProperty {
    /// Property name, upper case.
    pub name: String,
    /// Parameters as `(name, value)`, in the order they were written.
    pub params: Vec<(String, String)>,
    /// Value exactly as written (still escaped).
    pub value: String,
}

impl RawProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        RawProperty { name: name.into().to_ascii_uppercase(), params: Vec::new(), value: value.into() }
    }

    /// Value of the parameter `name`, compared case-insensitively.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    pub fn is_extension(&self) -> bool {
        self.name.starts_with("X-")
    }
}

/// Quote a parameter value when it contains characters that are special in a content line.
fn param_value(value: &str) -> String {
    if !value.starts_with('"') && value.contains([':', ';', ',']) {
        format!("\"{value}\"")
    } else {
        value.to_owned()
    }
}

impl fmt::Display for RawProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: String =
            self.params.iter().map(|(k, v)| format!(";{k}={}", param_value(v))).collect();
        folded_writeln!(f, "{}{params}:{}", self.name, self.value)
    }
}

/// A component kept as a tree of raw properties (`VALARM`, unknown components, or the parser's
/// view of a `VEVENT` before it's interpreted).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawComponent {
    pub name: String,
    pub properties: Vec<RawProperty>,
    pub components: Vec<RawComponent>,
}

impl RawComponent {
    pub fn new(name: impl Into<String>) -> Self {
        RawComponent { name: name.into().to_ascii_uppercase(), ..Default::default() }
    }

    /// First property called `name`.
    pub fn property(&self, name: &str) -> Option<&RawProperty> {
        self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RawComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        folded_writeln!(f, "BEGIN:{}", self.name)?;
        for property in &self.properties {
            write!(f, "{property}")?;
        }
        for component in &self.components {
            write!(f, "{component}")?;
        }
        folded_writeln!(f, "END:{}", self.name)
    }
}
