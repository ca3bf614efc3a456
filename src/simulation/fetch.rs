//! fetch.rs
//! Asynchronous access to stored graph models and forecast sheets, and
//! the in-memory libraries built from them for one run.

use super::env::ProcessFactory;
use super::SimulationError;
use crate::elements::build_element;
use crate::graph::description::{GraphModelDescription, Process, ProcessType};
use crate::graph::model::GraphModel;
use crate::graph::node::SimulationProcess;
use crate::projection::Variable;
use crate::store::MessageCode;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by a document source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("not found")]
    NotFound,
    #[error("trashed")]
    Trashed,
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait ModelSource: Send + Sync {
    /// `version` is `latest` or `r<n>`.
    async fn fetch_model(&self, id: &str, version: &str) -> Result<GraphModelDescription, SourceError>;
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch_variables(&self, sheet_id: &str, version: &str) -> Result<Vec<Variable>, SourceError>;
}

/// A document to fetch: id, version and the name used in error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    pub version: String,
    pub name: String,
}

impl Dependency {
    pub fn new(id: &str, version: &str, name: &str) -> Self {
        Self { id: id.to_string(), version: version.to_string(), name: name.to_string() }
    }
}

fn model_error(dep: &Dependency, err: SourceError) -> SimulationError {
    let (code, reason) = match err {
        SourceError::NotFound => (MessageCode::GraphModelMissing, "failed to fetch graph model".to_string()),
        SourceError::Trashed => (MessageCode::GraphModelTrashed, "graph model is trashed".to_string()),
        SourceError::Other(reason) => (MessageCode::Exception, reason),
    };
    warn!(model = %dep.id, version = %dep.version, ?code, "graph model fetch failed");
    SimulationError::Fetch { code, name: dep.name.clone(), reason }
}

fn sheet_error(dep: &Dependency, err: SourceError) -> SimulationError {
    let (code, reason) = match err {
        SourceError::NotFound => (MessageCode::ForecastSheetMissing, "failed to fetch forecast sheet".to_string()),
        SourceError::Trashed => (MessageCode::ForecastSheetTrashed, "forecast sheet is trashed".to_string()),
        SourceError::Other(reason) => (MessageCode::Exception, reason),
    };
    warn!(sheet = %dep.id, version = %dep.version, ?code, "forecast sheet fetch failed");
    SimulationError::Fetch { code, name: dep.name.clone(), reason }
}

/// Graph model descriptions by (id, version).
#[derive(Debug, Clone, Default)]
pub struct ModelLibrary {
    models: HashMap<(String, String), GraphModelDescription>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, version: &str, model: GraphModelDescription) {
        self.models.insert((id.to_string(), version.to_string()), model);
    }

    pub fn get(&self, id: &str, version: &str) -> Option<&GraphModelDescription> {
        self.models.get(&(id.to_string(), version.to_string()))
    }

    pub fn contains(&self, id: &str, version: &str) -> bool {
        self.get(id, version).is_some()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl ProcessFactory for ModelLibrary {
    fn build_process(&self, process: &Process, parent_path: &[String]) -> Result<Box<dyn SimulationProcess>, SimulationError> {
        match process.process_type {
            ProcessType::ProcessingElement => Ok(Box::new(build_element(process, parent_path)?)),
            ProcessType::GraphModel => {
                let version = process.version();
                let Some(description) = self.get(&process.reference, &version) else {
                    warn!(model = %process.reference, %version, "no such graph model");
                    return Err(SimulationError::InitFailed(format!(
                        "no such graph model '{}' ({})",
                        process.reference, version
                    )));
                };
                Ok(Box::new(GraphModel::new(description.clone(), process.clone(), parent_path)))
            }
        }
    }
}

/// Fetches `root` and every graph model nested in it, one nesting level
/// at a time; models of the same level are fetched concurrently.
pub async fn fetch_models(source: &dyn ModelSource, root: Dependency) -> Result<ModelLibrary, SimulationError> {
    let mut library = ModelLibrary::new();
    let mut level = vec![root];
    while !level.is_empty() {
        info!(models = level.len(), "fetching graph models");
        let fetched = try_join_all(level.iter().map(|dep| async move {
            source.fetch_model(&dep.id, &dep.version).await.map_err(|e| model_error(dep, e))
        }))
        .await?;

        let mut nested = Vec::new();
        for (dep, model) in level.iter().zip(fetched) {
            nested.extend(model.sub_model_refs());
            library.insert(&dep.id, &dep.version, model);
        }

        // 1. Next level: nested models neither fetched nor queued yet
        let mut next: Vec<Dependency> = Vec::new();
        for (id, version, name) in nested {
            if !library.contains(&id, &version) && !next.iter().any(|d| d.id == id && d.version == version) {
                next.push(Dependency { id, version, name });
            }
        }
        level = next;
    }
    debug!(models = library.len(), "graph model library complete");
    Ok(library)
}

/// Forecast variables by (sheet id, version).
#[derive(Debug, Clone, Default)]
pub struct SheetLibrary {
    sheets: HashMap<(String, String), Vec<Variable>>,
}

impl SheetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &str, version: &str, variables: Vec<Variable>) {
        self.sheets.insert((id.to_string(), version.to_string()), variables);
    }

    pub fn get(&self, id: &str, version: &str) -> Option<&[Variable]> {
        self.sheets.get(&(id.to_string(), version.to_string())).map(Vec::as_slice)
    }

    pub fn contains(&self, id: &str, version: &str) -> bool {
        self.get(id, version).is_some()
    }
}

/// Fetches the sheets of `deps` not yet in `library`, concurrently.
pub async fn fetch_sheets(
    source: &dyn ForecastSource,
    deps: &[Dependency],
    library: &mut SheetLibrary,
) -> Result<(), SimulationError> {
    let missing: Vec<&Dependency> = deps.iter().filter(|d| !library.contains(&d.id, &d.version)).collect();
    if missing.is_empty() {
        return Ok(());
    }
    info!(sheets = missing.len(), "fetching forecast sheets");
    let fetched = try_join_all(missing.iter().map(|dep| async move {
        source.fetch_variables(&dep.id, &dep.version).await.map_err(|e| sheet_error(dep, e))
    }))
    .await?;
    for (dep, variables) in missing.into_iter().zip(fetched) {
        library.insert(&dep.id, &dep.version, variables);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::description::{ProcessPort, Tracking};
    use crate::projection::VariableType;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Store {
        models: HashMap<(String, String), GraphModelDescription>,
        trashed: Vec<String>,
        calls: AtomicUsize,
    }

    impl Store {
        fn with(mut self, version: &str, model: GraphModelDescription) -> Self {
            self.models.insert((model.object_id.clone(), version.to_string()), model);
            self
        }
    }

    #[async_trait]
    impl ModelSource for Store {
        async fn fetch_model(&self, id: &str, version: &str) -> Result<GraphModelDescription, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.trashed.iter().any(|t| t == id) {
                return Err(SourceError::Trashed);
            }
            self.models.get(&(id.to_string(), version.to_string())).cloned().ok_or(SourceError::NotFound)
        }
    }

    #[async_trait]
    impl ForecastSource for Store {
        async fn fetch_variables(&self, sheet_id: &str, _version: &str) -> Result<Vec<Variable>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match sheet_id {
                "sheet" => Ok(vec![Variable::new("v", "Users", VariableType::Integer, None)]),
                _ => Err(SourceError::NotFound),
            }
        }
    }

    fn nesting(id: &str, sub: &str, release: Option<u32>) -> GraphModelDescription {
        let mut process = Process::new("p", ProcessType::GraphModel, sub)
            .with_inport(ProcessPort::new("p_in", "in"))
            .with_outport(ProcessPort::new("p_out", "out"));
        process.name = Some(format!("{} instance", sub));
        if let Some(nr) = release {
            process.release_nr = Some(nr);
            process.tracking = Some(Tracking::Fixed);
        }
        GraphModelDescription::new(id, id).with_inport("in", "In").with_outport("out", "Out").with_process(process)
    }

    fn leaf(id: &str) -> GraphModelDescription {
        GraphModelDescription::new(id, id).with_inport("in", "In").with_outport("out", "Out").connect("in", "out")
    }

    #[test]
    fn test_fetches_nested_models_by_version() {
        let store = Store::default()
            .with("latest", nesting("root", "mid", Some(2)))
            .with("r2", nesting("mid", "leaf", None))
            .with("latest", leaf("leaf"));
        let library = block_on(fetch_models(&store, Dependency::new("root", "latest", "root"))).unwrap();
        assert_eq!(library.len(), 3);
        assert!(library.contains("mid", "r2"));
        assert!(!library.contains("mid", "latest"));
    }

    #[test]
    fn test_self_nesting_model_is_fetched_once() {
        let store = Store::default().with("latest", nesting("loop", "loop", None));
        let library = block_on(fetch_models(&store, Dependency::new("loop", "latest", "root"))).unwrap();
        assert_eq!(library.len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_and_trashed_models() {
        let store = Store::default().with("latest", nesting("root", "gone", None));
        let err = block_on(fetch_models(&store, Dependency::new("root", "latest", "root"))).unwrap_err();
        assert_eq!(err.code(), MessageCode::GraphModelMissing);
        assert!(matches!(err, SimulationError::Fetch { ref name, .. } if name == "gone instance"));

        let mut store = Store::default().with("latest", leaf("root"));
        store.trashed.push("root".into());
        let err = block_on(fetch_models(&store, Dependency::new("root", "latest", "Web"))).unwrap_err();
        assert_eq!(err.code(), MessageCode::GraphModelTrashed);
    }

    #[test]
    fn test_library_builds_elements_and_nested_models() {
        let mut library = ModelLibrary::new();
        library.insert("leaf", "latest", leaf("leaf"));

        let nested = Process::new("n", ProcessType::GraphModel, "leaf");
        let built = library.build_process(&nested, &["root".to_string()]).unwrap();
        assert_eq!(built.label(), "leaf");

        let pinned = Process { release_nr: Some(4), ..nested };
        assert!(matches!(library.build_process(&pinned, &[]), Err(SimulationError::InitFailed(_))));

        let sum = Process::element("s", crate::elements::arith::SUM_ID);
        assert_eq!(library.build_process(&sum, &[]).unwrap().label(), "Sum");
    }

    #[test]
    fn test_sheets_are_fetched_once() {
        let store = Store::default();
        let deps = vec![Dependency::new("sheet", "latest", "Forecast")];
        let mut library = SheetLibrary::new();
        block_on(fetch_sheets(&store, &deps, &mut library)).unwrap();
        block_on(fetch_sheets(&store, &deps, &mut library)).unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(library.get("sheet", "latest").map(<[Variable]>::len), Some(1));

        let err = block_on(fetch_sheets(&store, &[Dependency::new("nope", "r1", "Old")], &mut library)).unwrap_err();
        assert_eq!(err.code(), MessageCode::ForecastSheetMissing);
    }
}
