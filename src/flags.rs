//! Argument builder for invoking commands programmatically

use std::fmt;

/// Collects `--flag` and `--option=value` arguments
///
/// Plain flags come before options when unpacked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagBuilder {
    flags: Vec<String>,
    options: Vec<(String, String)>,
}

impl FlagBuilder {
    /// Start from a set of flag names (without the leading `--`)
    pub fn new<I, S>(starting: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            flags: starting.into_iter().map(Into::into).collect(),
            options: Vec::new(),
        }
    }

    /// Add `--flag`, or `--flag=value` when a value is given
    pub fn add(mut self, flag: &str, value: Option<&dyn fmt::Display>) -> Self {
        match value {
            Some(value) => self.options.push((flag.to_string(), value.to_string())),
            None => self.flags.push(flag.to_string()),
        }
        self
    }

    /// Add `--flag` when `value` is set
    pub fn add_if(self, flag: &str, value: bool) -> Self {
        if value {
            self.add(flag, None)
        } else {
            self
        }
    }

    /// Add `--flag` or `--no-flag`, or nothing when unset
    pub fn add_negatable(self, flag: &str, value: Option<bool>) -> Self {
        match value {
            Some(true) => self.add(flag, None),
            Some(false) => self.add(&format!("no-{}", flag), None),
            None => self,
        }
    }

    /// Add `--flag=value` when a value is present
    pub fn add_value_if_present<T: fmt::Display>(self, flag: &str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.add(flag, Some(&value)),
            None => self,
        }
    }

    /// The argument list, flags first
    pub fn unpack(&self) -> Vec<String> {
        self.flags
            .iter()
            .map(|flag| format!("--{}", flag))
            .chain(
                self.options
                    .iter()
                    .map(|(key, value)| format!("--{}={}", key, value)),
            )
            .collect()
    }
}

impl fmt::Display for FlagBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unpack().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_order() {
        let flags = FlagBuilder::new(["force"])
            .add_value_if_present("path", Some("custom.json"))
            .add("preset", None);

        assert_eq!(
            flags.unpack(),
            vec!["--force", "--preset", "--path=custom.json"]
        );
        assert_eq!(flags.to_string(), "--force --preset --path=custom.json");
    }

    #[test]
    fn test_negatable() {
        let flags = FlagBuilder::default()
            .add_negatable("exit", Some(false))
            .add_negatable("print", Some(true))
            .add_negatable("cache", None);

        assert_eq!(flags.unpack(), vec!["--no-exit", "--print"]);
    }

    #[test]
    fn test_skips_missing_values() {
        let flags = FlagBuilder::default()
            .add_value_if_present::<&str>("path", None)
            .add_if("verbose", false);

        assert!(flags.unpack().is_empty());
        assert_eq!(flags.to_string(), "");
    }
}
