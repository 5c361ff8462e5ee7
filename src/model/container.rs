use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};

/// Where a container's image comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    BuildImage(PathBuf),
    PullImage(String),
}

/// A container as declared in the configuration file.
///
/// Identity is full value equality: two configs that happen to share a name
/// but differ in anything else are different containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub name: String,
    pub image_source: ImageSource,
    pub build_args: BTreeMap<String, String>,
    pub command: Option<Command>,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortMapping>,
    pub dependencies: Vec<String>,
}

impl Container {
    /// A container with nothing but a name and an image source.
    pub fn new(name: impl Into<String>, image_source: ImageSource) -> Self {
        Self {
            name: name.into(),
            image_source,
            build_args: BTreeMap::new(),
            command: None,
            working_directory: None,
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            dependencies: Vec::new(),
        }
    }
}

/// A command line, kept both as written and split into shell words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    original: String,
    parsed: Vec<String>,
}

impl Command {
    pub fn parse(command: &str) -> Result<Self, shell_words::ParseError> {
        Ok(Self {
            original: command.to_string(),
            parsed: shell_words::split(command)?,
        })
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn parsed(&self) -> &[String] {
        &self.parsed
    }
}

/// Single-line form: every line break (`\n`, `\r\n` or `\r`) becomes one space.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let single_line = self
            .original
            .replace("\r\n", " ")
            .replace(['\r', '\n'], " ");
        f.write_str(&single_line)
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Command::parse(&raw).map_err(|e| de::Error::custom(format!("invalid command: {e}")))
    }
}

/// `local:container` port publication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub local: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.container)
    }
}

impl<'de> Deserialize<'de> for PortMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PortVisitor;

        impl<'de> Visitor<'de> for PortVisitor {
            type Value = PortMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a port mapping like \"8080:80\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<PortMapping, E> {
                let (local, container) = value
                    .split_once(':')
                    .ok_or_else(|| E::custom(format!("port mapping '{value}' is missing a ':'")))?;
                let parse = |part: &str| {
                    part.trim().parse::<u16>().map_err(|_| {
                        E::custom(format!("port mapping '{value}' contains an invalid port"))
                    })
                };
                Ok(PortMapping {
                    local: parse(local)?,
                    container: parse(container)?,
                })
            }
        }

        deserializer.deserialize_str(PortVisitor)
    }
}

/// `local:container[:options]` volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub local: String,
    pub container: String,
    pub options: Option<String>,
}

impl fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.local, self.container)?;
        if let Some(options) = &self.options {
            write!(f, ":{options}")?;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for VolumeMount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct VolumeVisitor;

        impl<'de> Visitor<'de> for VolumeVisitor {
            type Value = VolumeMount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a volume mount like \"./src:/code\" or \"./src:/code:cached\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<VolumeMount, E> {
                let parts: Vec<&str> = value.split(':').collect();
                match parts.as_slice() {
                    [local, container] if !local.is_empty() && !container.is_empty() => {
                        Ok(VolumeMount {
                            local: local.to_string(),
                            container: container.to_string(),
                            options: None,
                        })
                    }
                    [local, container, options]
                        if !local.is_empty() && !container.is_empty() && !options.is_empty() =>
                    {
                        Ok(VolumeMount {
                            local: local.to_string(),
                            container: container.to_string(),
                            options: Some(options.to_string()),
                        })
                    }
                    _ => Err(E::custom(format!("invalid volume mount '{value}'"))),
                }
            }
        }

        deserializer.deserialize_str(VolumeVisitor)
    }
}
