use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProfile {
    pub name: String,
    pub provider: String,
    pub model_name: String,
    #[serde(default, rename = "baseURL")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: String,
    pub max_tokens: u32,
    pub context_length: u32,
    #[serde(default)]
    pub in_rate_per_1k: f64,
    #[serde(default)]
    pub out_rate_per_1k: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPointers {
    pub main: Option<String>,
    pub task: Option<String>,
    pub reasoning: Option<String>,
    pub quick: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub model_profiles: Vec<ModelProfile>,
    #[serde(default)]
    pub model_pointers: ModelPointers,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub num_startups: u32,
}

fn default_theme() -> String {
    "default".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_profiles: Vec::new(),
            model_pointers: ModelPointers::default(),
            theme: default_theme(),
            verbose: false,
            num_startups: 0,
        }
    }
}

impl Config {
    pub fn profile_for(&self, pointer: Option<&str>) -> Option<&ModelProfile> {
        let name = pointer.or(self.model_pointers.main.as_deref())?;
        self.model_profiles.iter().find(|p| p.name == name)
    }
}
