use std::path::PathBuf;

use histo_common::Classification;
use mitosis::{ClassificationModel, InputBatch, ProbabilityMap, SegmentationModel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{BridgeError, Result},
    runner::ScriptRunner,
};

/// How to launch an external model program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptModelConfig {
    /// Executable to run, e.g. `python` or `uv`
    pub program: PathBuf,
    /// Arguments placed before `--input`, typically the script path
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    /// Model input height in pixels
    pub input_height: u32,
    /// Model input width in pixels
    pub input_width: u32,
    /// Forwarded verbatim through the params file
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub params: Value,
}

impl ScriptModelConfig {
    pub fn runner(&self) -> ScriptRunner {
        let runner = ScriptRunner::new(&self.program).with_args(self.args.iter().cloned());
        match &self.working_dir {
            Some(dir) => runner.with_working_dir(dir),
            None => runner,
        }
    }
}

#[derive(Debug, Serialize)]
struct TensorRef<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

#[derive(Debug, Deserialize)]
struct TensorPayload {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationPayload {
    Index { class_index: usize },
    Logits { logits: Vec<f32> },
}

fn run_batch(runner: &ScriptRunner, batch: &InputBatch, params: &Value) -> Result<Value> {
    let shape = batch.shape();
    let data = batch.to_nhwc();
    runner.run(&TensorRef { shape: &shape, data: &data }, params)
}

/// Parse a `{shape, data}` response into a probability map
pub fn parse_probability_map(response: Value) -> Result<ProbabilityMap> {
    let payload: TensorPayload = serde_json::from_value(response)?;
    Ok(ProbabilityMap::from_shape(&payload.shape, payload.data)?)
}

/// Parse a `{class_index}` or `{logits}` response into a label
pub fn parse_classification(response: Value) -> Result<Classification> {
    let index = match serde_json::from_value::<ClassificationPayload>(response)? {
        ClassificationPayload::Index { class_index } => class_index,
        ClassificationPayload::Logits { logits } => argmax(&logits)
            .ok_or_else(|| BridgeError::InvalidResponse("empty logits".to_string()))?,
    };

    Classification::from_class_index(index)
        .map_err(|err| BridgeError::InvalidResponse(err.to_string()))
}

fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
}

/// Segmentation network served by an external program
pub struct ScriptSegmentationModel {
    runner: ScriptRunner,
    input_size: (u32, u32),
    params: Value,
}

impl ScriptSegmentationModel {
    pub fn new(runner: ScriptRunner, input_height: u32, input_width: u32) -> Self {
        Self {
            runner,
            input_size: (input_height, input_width),
            params: Value::Null,
        }
    }

    pub fn from_config(config: &ScriptModelConfig) -> Self {
        Self::new(config.runner(), config.input_height, config.input_width)
            .with_params(config.params.clone())
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

impl SegmentationModel for ScriptSegmentationModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn predict(&self, batch: &InputBatch) -> mitosis::Result<ProbabilityMap> {
        let response = run_batch(&self.runner, batch, &self.params)?;
        let map = parse_probability_map(response)?;
        debug!(
            "{} returned a {}x{} map",
            self.runner.program().display(),
            map.width(),
            map.height()
        );
        Ok(map)
    }

    fn name(&self) -> &str {
        "script segmentation"
    }
}

/// Classifier served by an external program
pub struct ScriptClassificationModel {
    runner: ScriptRunner,
    input_size: (u32, u32),
    params: Value,
}

impl ScriptClassificationModel {
    pub fn new(runner: ScriptRunner, input_height: u32, input_width: u32) -> Self {
        Self {
            runner,
            input_size: (input_height, input_width),
            params: Value::Null,
        }
    }

    pub fn from_config(config: &ScriptModelConfig) -> Self {
        Self::new(config.runner(), config.input_height, config.input_width)
            .with_params(config.params.clone())
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

impl ClassificationModel for ScriptClassificationModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn classify(&self, batch: &InputBatch) -> mitosis::Result<Classification> {
        let response = run_batch(&self.runner, batch, &self.params)?;
        Ok(parse_classification(response)?)
    }

    fn name(&self) -> &str {
        "script classification"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb32FImage;
    use mitosis::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_parse_probability_map_squeezes() {
        let map = parse_probability_map(json!({
            "shape": [1, 2, 3, 1],
            "data": [0.0, 0.1, 0.2, 0.3, 0.4, 0.5],
        }))
        .expect("Should parse map");

        assert_eq!(map.dimensions(), (3, 2));
        assert_eq!(map.get(2, 1), 0.5);
    }

    #[test]
    fn test_parse_probability_map_rejects_3d() {
        let err =
            parse_probability_map(json!({"shape": [2, 2, 2], "data": vec![0.0; 8]})).unwrap_err();
        assert_eq!(mitosis::MitosisError::from(err).kind(), ErrorKind::Shape);
    }

    #[test]
    fn test_parse_classification() {
        let cases = [
            (json!({"class_index": 1}), Classification::NonCancerous),
            (json!({"class_index": 0}), Classification::Cancerous),
            (json!({"logits": [0.2, 1.7]}), Classification::NonCancerous),
            (json!({"logits": [3.0, -1.0]}), Classification::Cancerous),
        ];
        for (response, expected) in cases {
            assert_eq!(parse_classification(response).unwrap(), expected);
        }
    }

    #[test]
    fn test_parse_classification_errors() {
        let responses = [json!({"class_index": 7}), json!({"logits": []}), json!({"label": "x"})];
        for response in responses {
            let err = mitosis::MitosisError::from(parse_classification(response).unwrap_err());
            assert_eq!(err.kind(), ErrorKind::ModelInference);
        }
    }

    #[cfg(unix)]
    mod scripts {
        use super::*;

        fn shell(script: &str) -> ScriptRunner {
            ScriptRunner::new("sh").with_args(["-c", script, "model"])
        }

        fn batch(height: u32, width: u32) -> InputBatch {
            InputBatch::single(Rgb32FImage::new(width, height))
        }

        #[test]
        fn test_script_segmentation() {
            let model = ScriptSegmentationModel::new(
                shell(r#"echo '{"shape": [1, 2, 2], "data": [0.9, 0.1, 0.1, 0.9]}'"#),
                2,
                2,
            );
            let map = model.predict(&batch(2, 2)).expect("Should predict");
            assert_eq!(map.dimensions(), (2, 2));
            assert_eq!(map.get(1, 0), 0.1);
        }

        #[test]
        fn test_script_classification_reads_params() {
            let model = ScriptClassificationModel::new(shell(r#"cat "$4""#), 4, 4)
                .with_params(json!({"class_index": 1}));
            assert_eq!(model.classify(&batch(4, 4)).unwrap(), Classification::NonCancerous);
        }

        #[test]
        fn test_script_receives_batch_shape() {
            let model = ScriptClassificationModel::new(
                shell(r#"grep -q '"shape":\[1,4,6,3\]' "$2" && echo '{"class_index": 0}'"#),
                4,
                6,
            );
            assert_eq!(model.classify(&batch(4, 6)).unwrap(), Classification::Cancerous);
        }

        #[test]
        fn test_script_failure_is_inference_error() {
            let model = ScriptSegmentationModel::new(shell("exit 1"), 2, 2);
            let err = model.predict(&batch(2, 2)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ModelInference);
        }

        #[test]
        fn test_from_config() {
            let config: ScriptModelConfig = serde_json::from_value(json!({
                "program": "sh",
                "args": ["-c", "echo '{\"logits\": [0.0, 1.0]}'", "model"],
                "input_height": 64,
                "input_width": 64,
            }))
            .unwrap();
            assert_eq!(config.params, Value::Null);

            let model = ScriptClassificationModel::from_config(&config);
            assert_eq!(model.input_size(), (64, 64));
            assert_eq!(model.classify(&batch(64, 64)).unwrap(), Classification::NonCancerous);
        }
    }
}
