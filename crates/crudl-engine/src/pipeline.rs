//! # Transform Pipeline
//!
//! Stages transform the records of an envelope after the underlying connector
//! call has completed and before the result reaches the caller. A stage sees
//! each record by reference and returns a new one; the input envelope is never
//! modified.
//!
//! ```rust
//! use crudl_engine::pipeline::{with_column, Pipeline};
//! use crudl_engine::{Envelope, Payload, envelope::record};
//! use serde_json::json;
//!
//! let rows = Envelope::many(vec![record(json!({"owner": "admin"}))]);
//! let annotated = Pipeline::new()
//!     .map(with_column("is_owner", |row| json!(row["owner"] == "admin")))
//!     .apply(&rows);
//!
//! let Payload::Many(out) = annotated.data() else { unreachable!() };
//! assert_eq!(out[0]["is_owner"], true);
//! ```

use crate::envelope::{Envelope, Payload, Record};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub type Stage = Arc<dyn Fn(&Record) -> Record + Send + Sync>;

/// Awaits `input` and applies `f` to its payload.
///
/// `f` runs on every element of a collection payload, or on the record itself.
/// If `input` fails the error is returned and `f` is never called.
pub async fn transform<Fut, E, F>(input: Fut, f: F) -> Result<Envelope<Payload>, E>
where
    Fut: Future<Output = Result<Envelope<Payload>, E>>,
    F: Fn(&Record) -> Record,
{
    let envelope = input.await?;
    Ok(apply(&envelope, f))
}

/// Applies `f` to the payload, returning a new envelope with the same metadata.
pub fn apply(envelope: &Envelope<Payload>, f: impl Fn(&Record) -> Record) -> Envelope<Payload> {
    envelope.map_data(|payload| match payload {
        Payload::Many(records) => Payload::Many(records.iter().map(&f).collect()),
        Payload::One(record) => Payload::One(f(record)),
    })
}

/// A stage that adds (or replaces) one computed column.
pub fn with_column<F>(column: impl Into<String>, compute: F) -> impl Fn(&Record) -> Record + Send + Sync + 'static
where
    F: Fn(&Record) -> Value + Send + Sync + 'static,
{
    let column = column.into();
    move |record: &Record| {
        let mut next = record.clone();
        next.insert(column.clone(), compute(record));
        next
    }
}

/// An ordered list of stages, applied left to right.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map<F>(mut self, stage: F) -> Self
    where
        F: Fn(&Record) -> Record + Send + Sync + 'static,
    {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&self, envelope: &Envelope<Payload>) -> Envelope<Payload> {
        self.stages
            .iter()
            .fold(envelope.clone(), |current, stage| apply(&current, stage.as_ref()))
    }

    pub async fn run<Fut, E>(&self, input: Fut) -> Result<Envelope<Payload>, E>
    where
        Fut: Future<Output = Result<Envelope<Payload>, E>>,
    {
        let envelope = input.await?;
        Ok(self.apply(&envelope))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.stages.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{record, Pagination};
    use crate::error::ConnectorError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rows() -> Envelope<Payload> {
        Envelope::many(vec![
            record(json!({"id": 1, "owner": "admin"})),
            record(json!({"id": 2, "owner": "demo"})),
        ])
        .with_pagination(Some(Pagination::new(1, 20, 2)))
    }

    #[tokio::test]
    async fn transform_maps_every_row_and_keeps_metadata() {
        let input = rows();
        let out = transform(async { Ok::<_, ConnectorError>(input.clone()) }, |r| {
            let mut r = r.clone();
            r.insert("seen".into(), json!(true));
            r
        })
        .await
        .unwrap();

        let Payload::Many(out_rows) = out.data() else { panic!("expected rows") };
        assert!(out_rows.iter().all(|r| r["seen"] == true));
        assert_eq!(out.total(), input.total());
        assert_eq!(out.pagination(), input.pagination());
        // The source envelope is untouched.
        let Payload::Many(in_rows) = input.data() else { panic!("expected rows") };
        assert!(in_rows.iter().all(|r| !r.contains_key("seen")));
    }

    #[tokio::test]
    async fn transform_on_failure_skips_the_stage() {
        let calls = AtomicUsize::new(0);
        let result = transform(
            async { Err::<Envelope<Payload>, _>(ConnectorError::Transport("down".into())) },
            |r| {
                calls.fetch_add(1, Ordering::SeqCst);
                r.clone()
            },
        )
        .await;

        assert_eq!(result, Err(ConnectorError::Transport("down".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn stages_compose_left_to_right() {
        let pipeline = Pipeline::new()
            .map(with_column("n", |_| json!(1)))
            .map(with_column("n", |r| json!(r["n"].as_i64().unwrap_or(0) * 10)));
        let out = pipeline.apply(&Envelope::one(record(json!({}))));
        assert_eq!(out.data(), &Payload::One(record(json!({"n": 10}))));
    }
}
