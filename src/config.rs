//! JSON configuration document shape: an array of canvases, each carrying
//! its features and effects. Hydrated with `serde_json`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfigDocument {
    pub canvases: Vec<CanvasConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasConfig {
    pub id: i64,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
    #[serde(default)]
    pub effects: Vec<EffectConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureConfig {
    #[serde(rename = "type")]
    pub r#type: String,
    pub host_name: String,
    pub friendly_name: String,
    pub port: u16,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub offset_x: u32,
    #[serde(default)]
    pub offset_y: u32,
    #[serde(default)]
    pub reversed: bool,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub red_green_swap: bool,
    #[serde(default)]
    pub client_buffer_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectConfig {
    #[serde(rename = "type")]
    pub r#type: String,
    pub name: String,
    #[serde(flatten)]
    pub params: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let json = r#"{
            "canvases": [
                {
                    "id": 1,
                    "name": "Workbench Matrix",
                    "width": 512,
                    "height": 32,
                    "fps": 30,
                    "features": [
                        {
                            "type": "LEDFeature",
                            "hostName": "192.168.8.176",
                            "friendlyName": "Workbench Matrix",
                            "port": 49152,
                            "width": 512,
                            "height": 32
                        }
                    ],
                    "effects": [
                        { "type": "ColorWave", "name": "Color Wave" }
                    ]
                }
            ]
        }"#;
        let doc: ConfigDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.canvases.len(), 1);
        assert_eq!(doc.canvases[0].features[0].host_name, "192.168.8.176");
        assert_eq!(doc.canvases[0].effects[0].r#type, "ColorWave");
    }
}
