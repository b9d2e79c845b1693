use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::method::{FetchMethod, FetchMode, OutputFormat};

pub const DEFAULT_CHUNK_SIZE: usize = 4096;
const CONFIG_FILE_NAME: &str = "seqfetch.json";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodEntry>,
    #[serde(default)]
    pub sources: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub default: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MethodEntry {
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(flatten)]
    pub mode: FetchMode,
}

/// Everything a bulk fetch needs from configuration, resolved once and
/// passed by reference.
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub schema_version: u32,
    pub chunk_size: usize,
    methods: Vec<FetchMethod>,
    sources: HashMap<String, Vec<usize>>,
    default: Vec<usize>,
}

impl FetchContext {
    /// Context with a single method list used for every source.
    pub fn with_methods(methods: Vec<FetchMethod>) -> Self {
        let default = (0..methods.len()).collect();
        Self {
            schema_version: 1,
            chunk_size: DEFAULT_CHUNK_SIZE,
            methods,
            sources: HashMap::new(),
            default,
        }
    }

    /// Assigns an ordered method list (by method name) to a source.
    pub fn assign_source(
        &mut self,
        source: impl Into<String>,
        method_names: &[&str],
    ) -> Result<(), FetchError> {
        let source = source.into();
        let indices = method_names
            .iter()
            .map(|name| self.method_index(&source, name))
            .collect::<Result<Vec<_>, _>>()?;
        self.sources.insert(source, indices);
        Ok(())
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn methods(&self) -> &[FetchMethod] {
        &self.methods
    }

    /// Ordered methods for a source: primary first, then fallbacks.
    pub fn methods_for(&self, source: Option<&str>) -> Vec<&FetchMethod> {
        self.indices_for(source)
            .iter()
            .map(|index| &self.methods[*index])
            .collect()
    }

    /// Method to use for `source` at retry `attempt`, if one remains.
    pub fn method_at(&self, source: Option<&str>, attempt: usize) -> Option<&FetchMethod> {
        self.indices_for(source)
            .get(attempt)
            .map(|index| &self.methods[*index])
    }

    /// Upper bound on retry attempts: the longest method list of any source.
    pub fn max_attempts(&self) -> usize {
        self.sources
            .values()
            .map(Vec::len)
            .chain(std::iter::once(self.default.len()))
            .max()
            .unwrap_or(0)
    }

    fn indices_for(&self, source: Option<&str>) -> &[usize] {
        source
            .and_then(|source| self.sources.get(source))
            .map(Vec::as_slice)
            .unwrap_or(&self.default)
    }

    fn method_index(&self, source: &str, name: &str) -> Result<usize, FetchError> {
        self.methods
            .iter()
            .position(|method| method.name == name)
            .ok_or_else(|| FetchError::UnknownMethod {
                source_name: source.to_string(),
                method: name.to_string(),
            })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<FetchContext, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(FetchError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// `seqfetch.json` in the working directory, else the platform config dir.
    pub fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        ProjectDirs::from("org", "seqfetch", "seqfetch")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<FetchContext, FetchError> {
        let schema_version = config.schema_version.unwrap_or(1);
        let methods = config
            .methods
            .into_iter()
            .map(|(name, entry)| {
                validate_mode(&name, &entry.mode)?;
                Ok(FetchMethod {
                    name,
                    format: entry.format,
                    mode: entry.mode,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;

        let mut context = FetchContext {
            schema_version,
            chunk_size: config.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE).max(1),
            methods,
            sources: HashMap::new(),
            default: Vec::new(),
        };

        context.default = config
            .default
            .iter()
            .map(|name| context.method_index("default", name))
            .collect::<Result<Vec<_>, _>>()?;
        for (source, names) in &config.sources {
            let names = names.iter().map(String::as_str).collect::<Vec<_>>();
            context.assign_source(source.clone(), &names)?;
        }

        Ok(context)
    }
}

fn validate_mode(name: &str, mode: &FetchMode) -> Result<(), FetchError> {
    let reason = match mode {
        FetchMode::Socket(params) if params.host.trim().is_empty() => "socket host is empty",
        FetchMode::Socket(params) if params.port == 0 => "socket port is zero",
        FetchMode::Http(params) if params.location.trim().is_empty() => "http location is empty",
        FetchMode::Command(params) if params.location.as_str().is_empty() => {
            "command location is empty"
        }
        _ => return Ok(()),
    };
    Err(FetchError::InvalidMethod {
        method: name.to_string(),
        reason: reason.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const SAMPLE: &str = r#"{
        "methods": {
            "pfetch": {"mode": "socket", "host": "pfetch.example.org", "port": 22100},
            "pfetch-http": {"mode": "http", "location": "https://example.org/pfetch", "format": "fasta"}
        },
        "sources": {"EMBL": ["pfetch", "pfetch-http"]},
        "default": ["pfetch-http"]
    }"#;

    #[test]
    fn resolve_sample_config() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let context = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(context.schema_version, 1);
        assert_eq!(context.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(context.max_attempts(), 2);

        let embl = context.methods_for(Some("EMBL"));
        assert_eq!(embl[0].name, "pfetch");
        assert_eq!(embl[0].format, OutputFormat::Embl);
        assert_eq!(embl[1].name, "pfetch-http");

        assert_eq!(context.method_at(None, 0).unwrap().name, "pfetch-http");
        assert_eq!(context.method_at(Some("unknown"), 0).unwrap().name, "pfetch-http");
        assert!(context.method_at(None, 1).is_none());
    }

    #[test]
    fn unknown_method_reference_is_rejected() {
        let config: Config = serde_json::from_str(
            r#"{"methods": {}, "sources": {"EMBL": ["missing"]}}"#,
        )
        .unwrap();
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, FetchError::UnknownMethod { .. });
    }

    #[test]
    fn empty_socket_host_is_rejected() {
        let config: Config = serde_json::from_str(
            r#"{"methods": {"bad": {"mode": "socket", "host": " ", "port": 1}}}"#,
        )
        .unwrap();
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, FetchError::InvalidMethod { .. });
    }
}
