//! Model contract validation.
//!
//! `validate` compares a model's declared signatures with the agent's
//! `ObservationSpec` and returns every mismatch it finds. It is a pure
//! function: it never touches tensors and can run before anything is loaded.
//!
//! Checks run in this order:
//! 1. model metadata (api version)
//! 2. each recognized input against its semantic source in the `ObservationSpec`
//! 3. outputs needed to rebuild the action space
//! 4. inputs nobody can supply
//!
//! `certify` is the only way to obtain a `ValidatedModel`, which is the only
//! thing the `InferenceExecutor` will accept.

use std::collections::HashSet;

use tracing::warn;

use crate::domain::names::{self, InputRole, OutputRole};
use crate::domain::{
    BrainError, CompatibilityViolation, ElementKind, ObservationSpec, TensorSpec,
};
use crate::ports::{ModelHandle, ModelMetadata};

/// Validates raw signatures.
pub fn validate(
    spec: &ObservationSpec,
    inputs: &[TensorSpec],
    outputs: &[TensorSpec],
    metadata: &ModelMetadata,
) -> Vec<CompatibilityViolation> {
    let mut violations = Vec::new();

    if let Some(version) = metadata.api_version
        && version != names::SUPPORTED_API_VERSION
    {
        violations.push(CompatibilityViolation::new(
            "api_version",
            names::SUPPORTED_API_VERSION.to_string(),
            version.to_string(),
            "model was exported for an unsupported api version",
        ));
    }

    check_unique("input", inputs, &mut violations);
    check_unique("output", outputs, &mut violations);

    let mut unbound = Vec::new();
    for input in inputs {
        match InputRole::of(&input.name) {
            Some(role) => check_input(spec, input, role, outputs, &mut violations),
            None => unbound.push(input),
        }
    }

    check_outputs(spec, outputs, &mut violations);

    for input in unbound {
        violations.push(CompatibilityViolation::new(
            &input.name,
            "a recognized input",
            input.shape_display(),
            format!("model requires input '{}' which no source can supply", input.name),
        ));
    }

    violations
}

/// Validates a loaded handle.
pub fn validate_model(spec: &ObservationSpec, model: &dyn ModelHandle) -> Vec<CompatibilityViolation> {
    validate(
        spec,
        model.input_signature(),
        model.output_signature(),
        &model.metadata(),
    )
}

/// A model that passed validation against a specific `ObservationSpec`.
pub struct ValidatedModel {
    handle: Box<dyn ModelHandle>,
    spec: ObservationSpec,
}

impl ValidatedModel {
    pub fn handle(&self) -> &dyn ModelHandle {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> &mut dyn ModelHandle {
        self.handle.as_mut()
    }

    pub fn spec(&self) -> &ObservationSpec {
        &self.spec
    }

    pub fn release(self) {
        self.handle.release();
    }
}

/// Validates and wraps a handle. On failure the handle is released here.
pub fn certify(
    spec: &ObservationSpec,
    handle: Box<dyn ModelHandle>,
) -> Result<ValidatedModel, BrainError> {
    let violations = validate_model(spec, handle.as_ref());
    if violations.is_empty() {
        return Ok(ValidatedModel {
            handle,
            spec: spec.clone(),
        });
    }
    for v in &violations {
        warn!(field = %v.field, expected = %v.expected, actual = %v.actual, "{}", v.message);
    }
    handle.release();
    Err(BrainError::Configuration(violations))
}

fn check_unique(which: &str, specs: &[TensorSpec], out: &mut Vec<CompatibilityViolation>) {
    let mut seen = HashSet::new();
    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            out.push(CompatibilityViolation::new(
                &spec.name,
                "unique name",
                "duplicate",
                format!("{which} name '{}' is declared more than once", spec.name),
            ));
        }
    }
}

fn check_input(
    spec: &ObservationSpec,
    input: &TensorSpec,
    role: InputRole,
    outputs: &[TensorSpec],
    out: &mut Vec<CompatibilityViolation>,
) {
    let actions = &spec.action_space;
    match role {
        InputRole::VectorObservation => {
            if spec.vector_observation_size == 0 {
                out.push(undeclared(input, "vector observations"));
            } else {
                expect_row(input, &[spec.stacked_vector_width()], out);
            }
        }
        InputRole::VisualObservation(index) => match spec.visual_observation_shapes.get(index) {
            Some(shape) => expect_row(input, &[shape.height, shape.width, shape.channels], out),
            None => out.push(undeclared(input, "this visual observation")),
        },
        InputRole::PreviousAction => {
            if actions.has_discrete() {
                expect_row(input, &[actions.discrete_branch_sizes.len()], out);
            } else {
                out.push(undeclared(input, "discrete action branches"));
            }
        }
        InputRole::ActionMask => {
            if actions.has_discrete() {
                expect_row(input, &[actions.mask_width()], out);
            } else {
                out.push(undeclared(input, "discrete action branches"));
            }
        }
        InputRole::Epsilon => {
            if actions.continuous_size > 0 {
                expect_row(input, &[actions.continuous_size], out);
            } else {
                out.push(undeclared(input, "continuous actions"));
            }
        }
        InputRole::RecurrentIn => {
            let Some(width) = single_row(input, out) else {
                return;
            };
            let paired = outputs
                .iter()
                .find(|o| o.name == names::RECURRENT_OUT)
                .and_then(|o| o.row_width());
            if paired != Some(width) {
                out.push(CompatibilityViolation::new(
                    names::RECURRENT_OUT,
                    format!("[N, {width}]"),
                    paired.map_or("missing".to_string(), |w| format!("[N, {w}]")),
                    "recurrent input needs a recurrent output of the same width",
                ));
            }
        }
        InputRole::BatchSize | InputRole::SequenceLength => {
            if input.is_batched() || input.row_width() != Some(1) {
                out.push(CompatibilityViolation::new(
                    &input.name,
                    "[1]",
                    input.shape_display(),
                    "auxiliary scalar input must hold exactly one element",
                ));
            }
        }
    }
}

fn check_outputs(spec: &ObservationSpec, outputs: &[TensorSpec], out: &mut Vec<CompatibilityViolation>) {
    let actions = &spec.action_space;
    let find = |name: &str| outputs.iter().find(|o| o.name == name);

    if actions.continuous_size > 0 {
        match find(names::CONTINUOUS_ACTIONS) {
            Some(o) => expect_row(o, &[actions.continuous_size], out),
            None => out.push(missing_output(
                names::CONTINUOUS_ACTIONS,
                format!("[N, {}]", actions.continuous_size),
            )),
        }
    }

    for (branch, &size) in actions.discrete_branch_sizes.iter().enumerate() {
        let name = names::discrete_actions(branch);
        match find(&name) {
            Some(o) => {
                let direct = o.element_kind == ElementKind::Int && o.row_dims() == Some(vec![1]);
                if !direct {
                    expect_row(o, &[size], out);
                }
            }
            None => out.push(missing_output(&name, format!("[N, {size}]"))),
        }
    }

    for o in outputs {
        match OutputRole::of(&o.name) {
            Some(OutputRole::ContinuousActions) if actions.continuous_size == 0 => {
                out.push(undeclared(o, "continuous actions"));
            }
            Some(OutputRole::DiscreteActions(branch))
                if branch >= actions.discrete_branch_sizes.len() =>
            {
                out.push(undeclared(o, "this discrete branch"));
            }
            Some(OutputRole::ValueEstimate) => expect_row(o, &[1], out),
            _ => {}
        }
    }
}

fn expect_row(tensor: &TensorSpec, row: &[usize], out: &mut Vec<CompatibilityViolation>) {
    let expected = format!(
        "[N, {}]",
        row.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
    );
    if !tensor.is_batched() {
        out.push(CompatibilityViolation::new(
            &tensor.name,
            expected,
            tensor.shape_display(),
            "dimension 0 must be the batch axis",
        ));
        return;
    }
    if tensor.row_dims().as_deref() != Some(row) {
        out.push(CompatibilityViolation::new(
            &tensor.name,
            expected,
            tensor.shape_display(),
            "shape does not match the observation spec",
        ));
    }
}

fn single_row(tensor: &TensorSpec, out: &mut Vec<CompatibilityViolation>) -> Option<usize> {
    match (tensor.is_batched(), tensor.row_dims()) {
        (true, Some(dims)) if dims.len() == 1 => Some(dims[0]),
        _ => {
            out.push(CompatibilityViolation::new(
                &tensor.name,
                "[N, width]",
                tensor.shape_display(),
                "expected a batched rank-2 tensor",
            ));
            None
        }
    }
}

fn undeclared(tensor: &TensorSpec, what: &str) -> CompatibilityViolation {
    CompatibilityViolation::new(
        &tensor.name,
        format!("{what} in the observation spec"),
        "not declared",
        format!(
            "model requires '{}' but the observation spec does not declare {what}",
            tensor.name
        ),
    )
}

fn missing_output(name: &str, expected: String) -> CompatibilityViolation {
    CompatibilityViolation::new(
        name,
        expected,
        "missing",
        format!("model does not produce output '{name}' needed by the action space"),
    )
}
