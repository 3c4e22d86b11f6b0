use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::IntoEnumIterator;

use crate::{
    broadlink::Recording,
    daikin::{encode, ClimateState, Fan, Mode, Model, Preset, Swing},
};

/*
{
   "manufacturer":"Daikin",
   "supportedModels":["ARC470A1"],
   "supportedController":"Broadlink",
   "commandsEncoding":"Base64",
   "minTemperature":10.0,
   "maxTemperature":30.0,
   "precision":1,
   "operationModes":["heat", "cool", ...],
   "fanModes":["auto", "quiet", "level1", ...],
   "commands": { "off": "...", "cool": { "auto": { "22": "JgA..." } } }
}
*/

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CodeFile {
    pub manufacturer: String,
    pub supported_models: Vec<String>,
    pub supported_controller: String,
    pub commands_encoding: String,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub precision: u8,
    pub operation_modes: Vec<String>,
    pub fan_modes: Vec<String>,
    pub commands: Value,
}

/// Generates a SmartIR code file covering every mode, fan and setpoint of a remote model.
/// Swing and presets stay off, SmartIR has no dimension for them. Dry, auto and fan only
/// ignore the setpoint, so they get one command per fan.
pub fn gen_smartir(model: Model) -> CodeFile {
    // mode -> fan -> temperature, modes without a setpoint stop at the fan level
    let mut commands = Map::new();
    commands.insert("off".into(), encode_state(&ClimateState::new(model), model).into());

    for mode in operation_modes() {
        let mut fans = Map::new();

        for fan in Fan::iter() {
            let state = |target_temperature| ClimateState {
                mode,
                target_temperature,
                fan,
                swing: Swing::Off,
                preset: Preset::None,
            };

            let entry: Value = if !mode.sends_setpoint() {
                let default = ClimateState::new(model).target_temperature;
                encode_state(&state(default), model).into()
            } else {
                (model.min_temperature()..=model.max_temperature())
                    .map(|t| (t.to_string(), Value::from(encode_state(&state(t), model))))
                    .collect::<Map<_, _>>()
                    .into()
            };
            fans.insert(fan.as_ref().into(), entry);
        }

        commands.insert(mode.as_ref().into(), fans.into());
    }

    CodeFile {
        manufacturer: "Daikin".into(),
        supported_models: vec![model.to_string()],
        supported_controller: "Broadlink".into(),
        commands_encoding: "Base64".into(),
        min_temperature: model.min_temperature() as f32,
        max_temperature: model.max_temperature() as f32,
        precision: 1,
        operation_modes: operation_modes().map(|m| m.as_ref().into()).collect(),
        fan_modes: Fan::iter().map(|f| f.as_ref().into()).collect(),
        commands,
    }
}

fn operation_modes() -> impl Iterator<Item = Mode> {
    Mode::iter().filter(|&m| m != Mode::Off)
}

fn encode_state(state: &ClimateState, model: Model) -> String {
    let command = encode(state, model);
    base64::encode(Recording::from(&command).to_bytes())
}
