//! Classification prompt builder
//!
//! Renders the prompt sent to the LLM from a model descriptor, its example
//! predictions and the recognized task taxonomy. The output depends only on
//! the inputs, so the same model always produces the same prompt; the
//! `?prompt` debug mode relies on that to show exactly what would be sent.

use crate::{ModelDescriptor, ModelExample, OutputSchema, TaskTaxonomy};
use serde::Serialize;

/// Example outputs are cut to this many characters
pub const MAX_EXAMPLE_OUTPUT_CHARS: usize = 3000;

/// Line placed between rendered examples
pub const EXAMPLE_SEPARATOR: &str = "---------------";

/// Literal rendered when the registry publishes no output schema
const NO_VALUE: &str = "null";

const PREAMBLE: &str =
    "You are a helpful assistant that classifies AI models and returns JSON descriptions.";

const USE_CASE_SAMPLES: &[&str] = &[
    "Denoise audio recordings",
    "Colorize black-and-white photos",
    "Summarize long documents",
    "Transcribe podcasts to text",
    "Detect objects in images",
    "Generate text-to-speech audio",
    "Add captions to videos",
    "Animate a still photo",
    "Convert sketches to realistic images",
    "Generate music from text prompts",
    "Create 3D models from 2D images",
    "Convert handwriting to digital text",
    "Identify plants from photos",
    "Fix blurry images",
];

const OUTPUT_FORMAT: &str = "\
Return a JSON object with the following fields:

- summary: A short summary of what the model does in 10 words or less. This should not be a sales pitch.
- inputTypes: An array of the types of inputs the model accepts, like \"text\", \"image\", \"audio\", etc.
- outputTypes: An array of the types of outputs the model returns, like \"text\", \"image\", \"audio\", etc.
- task: The task the model performs. This must be one of the task names listed above.
- useCases: An array of 10 use cases for the model. Each one should be a single sentence of 8 words or less.

Do not include any other text in your response.
Do not explain your reasoning.
Just return the JSON object.
No code fencing.
No markdown.
No backticks.
No code blocks.";

/// Build the classification prompt for a model
pub fn build_prompt(
    descriptor: &ModelDescriptor,
    examples: &[ModelExample],
    taxonomy: &TaskTaxonomy,
) -> String {
    let mut sections: Vec<String> = Vec::with_capacity(8);

    sections.push(format!("{}\n\nHere's the model to classify:", PREAMBLE));

    sections.push(format!(
        "## Basic model info\n\nModel name: {}\nModel description: {}",
        descriptor.key.name,
        descriptor.description.as_deref().unwrap_or_default()
    ));

    sections.push(format!("## Model inputs\n\n{}", render_inputs(descriptor)));

    sections.push(format!(
        "## Model output schema\n\n{}\n\nIf the input or output schema includes a format of URI, it is referring to a file.",
        render_output_schema(descriptor.output_schema.as_ref())
    ));

    sections.push(format!(
        "## Example inputs and outputs\n\nUse these example outputs to better understand the types of inputs the model accepts, and the types of outputs the model returns:\n\n{}",
        render_examples(examples)
    ));

    sections.push(format!(
        "## Task classification\n\nBased on the information above, please classify the model into one of the following tasks:\n\n{}",
        render_taxonomy(taxonomy)
    ));

    let use_cases = USE_CASE_SAMPLES
        .iter()
        .map(|case| format!("- {}", case))
        .collect::<Vec<_>>()
        .join("\n");
    sections.push(format!(
        "## Use cases\n\nBased on the information above, please provide a list of use cases for the model, in the style of these:\n\n{}",
        use_cases
    ));

    sections.push(format!("## Output format\n\n{}", OUTPUT_FORMAT));

    sections.join("\n\n")
}

/// One line per declared input, in declared order
fn render_inputs(descriptor: &ModelDescriptor) -> String {
    descriptor
        .input_schema
        .iter()
        .map(|field| {
            format!(
                "- {}: {} ({})",
                field.name,
                field.description.as_deref().unwrap_or_default(),
                field.kind.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_output_schema(schema: Option<&OutputSchema>) -> String {
    match schema {
        Some(OutputSchema::Properties(properties)) => pretty_json(properties),
        Some(OutputSchema::Fragment(fragment)) => pretty_json(fragment),
        None => NO_VALUE.to_string(),
    }
}

fn render_examples(examples: &[ModelExample]) -> String {
    examples
        .iter()
        .enumerate()
        .map(|(index, example)| {
            let input = match serde_yaml::to_string(&example.input) {
                Ok(yaml) => yaml.trim_end().to_string(),
                Err(e) => {
                    tracing::debug!("Example input is not YAML-serializable: {}", e);
                    pretty_json(&example.input)
                }
            };
            let output: String = pretty_json(&example.output)
                .chars()
                .take(MAX_EXAMPLE_OUTPUT_CHARS)
                .collect();
            format!("Example {}:\n\nInput: {}\n\nOutput: {}", index + 1, input, output)
        })
        .collect::<Vec<_>>()
        .join(&format!("\n\n{}\n\n", EXAMPLE_SEPARATOR))
}

fn render_taxonomy(taxonomy: &TaskTaxonomy) -> String {
    taxonomy
        .tasks()
        .iter()
        .map(|task| format!("- {}: {}", task.name, task.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| NO_VALUE.to_string())
}
