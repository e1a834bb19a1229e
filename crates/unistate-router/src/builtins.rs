//! Built-in operations: state assignment, a sample computation, and a
//! handler that always fails.

use anyhow::{Context, bail};
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::debug;
use unistate_protocol::{Message, Tags};

use crate::operation::{Operation, OperationCx};

/// State key `axpy` publishes its result under.
pub const RESULT_VECTOR_KEY: &str = "result_vector";

/// `assign { key, value }`: sets `state[key] = value`. Sends nothing.
pub struct Assign;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignParams {
    pub key: String,
    pub value: Value,
}

impl Operation for Assign {
    type Params = AssignParams;

    fn tag(&self) -> &'static str {
        Tags::ASSIGN
    }

    async fn invoke(&self, cx: &mut OperationCx<'_>, params: AssignParams) -> anyhow::Result<()> {
        debug!("assign {} on {}", params.key, cx.client_id());
        cx.state_mut().set(params.key, params.value);
        Ok(())
    }
}

/// `axpy { a, x, y }`: computes `a * x + y` and publishes it as an
/// `assign` of [`RESULT_VECTOR_KEY`].
pub struct Axpy;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxpyParams {
    pub a: Number,
    pub x: Vec<Number>,
    pub y: Vec<Number>,
}

impl Operation for Axpy {
    type Params = AxpyParams;

    fn tag(&self) -> &'static str {
        Tags::AXPY
    }

    async fn invoke(&self, cx: &mut OperationCx<'_>, params: AxpyParams) -> anyhow::Result<()> {
        let result = axpy(&params.a, &params.x, &params.y)?;
        let values: Vec<Value> = result.into_iter().map(Value::Number).collect();
        cx.send(Message::assign(RESULT_VECTOR_KEY, values)).await?;
        Ok(())
    }
}

/// `a * x[i] + y[i]` for each pair, stopping at the shorter vector.
///
/// All-integer input stays integer unless it overflows `i64`; anything else
/// is computed in `f64`.
pub fn axpy(a: &Number, x: &[Number], y: &[Number]) -> anyhow::Result<Vec<Number>> {
    if let (Some(a), Some(x), Some(y)) = (a.as_i64(), as_integers(x), as_integers(y)) {
        let exact: Option<Vec<i64>> = x
            .iter()
            .zip(&y)
            .map(|(xi, yi)| a.checked_mul(*xi)?.checked_add(*yi))
            .collect();
        if let Some(exact) = exact {
            return Ok(exact.into_iter().map(Number::from).collect());
        }
    }

    let a = to_f64(a)?;
    x.iter()
        .zip(y)
        .map(|(xi, yi)| {
            let value = a * to_f64(xi)? + to_f64(yi)?;
            Number::from_f64(value).with_context(|| format!("result is not a finite number: {value}"))
        })
        .collect()
}

fn as_integers(values: &[Number]) -> Option<Vec<i64>> {
    values.iter().map(Number::as_i64).collect()
}

fn to_f64(value: &Number) -> anyhow::Result<f64> {
    value
        .as_f64()
        .with_context(|| format!("{value} cannot be represented as f64"))
}

/// `broken {}`: always fails. Exercises error reporting end to end.
pub struct Broken;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokenParams {}

impl Operation for Broken {
    type Params = BrokenParams;

    fn tag(&self) -> &'static str {
        Tags::BROKEN
    }

    async fn invoke(&self, _cx: &mut OperationCx<'_>, _params: BrokenParams) -> anyhow::Result<()> {
        bail!("broken operation invoked: this handler always fails")
    }
}
