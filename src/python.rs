use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::core::{ComparisonReport as RustComparisonReport, SelectionResult as RustSelectionResult};
use crate::providers::marketplace::MarketplaceClient;
use crate::{ComparisonEngine as RustComparisonEngine, FetchConfig, MatchEngineError, TargetListing};

fn to_py_err(e: MatchEngineError) -> PyErr {
    if e.is_invalid_input() {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string())
    } else if matches!(e, MatchEngineError::ListingMissing(_)) {
        PyErr::new::<pyo3::exceptions::PyLookupError, _>(e.to_string())
    } else {
        PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string())
    }
}

/// Python wrapper for ComparisonEngine
#[pyclass]
struct ComparisonEngine {
    engine: Arc<RustComparisonEngine>,
    listings: Arc<MarketplaceClient>,
    runtime: Arc<Runtime>,
}

#[pymethods]
impl ComparisonEngine {
    /// Create new ComparisonEngine over eBay search results
    #[new]
    fn new(base_url: Option<String>) -> PyResult<Self> {
        let runtime = Arc::new(
            Runtime::new()
                .map_err(|e| PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(e.to_string()))?,
        );

        let mut config = FetchConfig::default();
        if let Some(base_url) = base_url {
            config.base_url = base_url;
        }

        let listings =
            MarketplaceClient::new(Duration::from_secs(config.timeout_secs)).map_err(to_py_err)?;
        let engine = RustComparisonEngine::with_ebay(config).map_err(to_py_err)?;

        Ok(Self {
            engine: Arc::new(engine),
            listings: Arc::new(listings),
            runtime,
        })
    }

    /// Compare a listing against competitor results
    fn compare(&self, title: String, price: f64, days: Option<i64>) -> PyResult<PyObject> {
        let target = TargetListing::new(title, price, days.unwrap_or(0));

        let engine = self.engine.clone();
        let report = self
            .runtime
            .block_on(async move { engine.compare(&target).await.map_err(to_py_err) })?;

        Python::with_gil(|py| report_to_py(py, &report))
    }

    /// Compare the marketplace listing behind `url`; raises LookupError
    /// when the listing was removed
    fn compare_url(&self, url: String) -> PyResult<PyObject> {
        let engine = self.engine.clone();
        let listings = self.listings.clone();
        let report = self.runtime.block_on(async move {
            engine.compare_url(&listings, &url).await.map_err(to_py_err)
        })?;

        Python::with_gil(|py| report_to_py(py, &report))
    }
}

/// Convert SelectionResult to Python dict
fn selection_to_py(py: Python, best: &RustSelectionResult) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("title", &best.title)?;
    dict.set_item("price", best.price)?;
    dict.set_item("shipping", best.shipping)?;
    dict.set_item("country", &best.country)?;
    dict.set_item("condition", &best.condition)?;
    dict.set_item("similarity", best.similarity)?;
    Ok(dict.into())
}

/// Convert ComparisonReport to Python dict
fn report_to_py(py: Python, report: &RustComparisonReport) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    dict.set_item("listing_title", &report.listing_title)?;
    dict.set_item("listing_price", report.listing_price)?;
    dict.set_item("best", selection_to_py(py, &report.best)?)?;
    dict.set_item("best_score", report.best_score)?;
    dict.set_item("match_quality", format!("{:?}", report.match_quality))?;
    dict.set_item("price_rating", report.price_rating)?;

    let difference = PyDict::new(py);
    difference.set_item("amount", &report.price_difference.amount)?;
    difference.set_item("type", report.price_difference.kind.as_str())?;
    dict.set_item("price_difference", difference)?;

    // Parallel candidate sequences
    let candidates = PyDict::new(py);
    candidates.set_item("titles", &report.candidates.titles)?;
    candidates.set_item("prices", &report.candidates.prices)?;
    candidates.set_item("shippings", &report.candidates.shippings)?;
    candidates.set_item("countries", &report.candidates.countries)?;
    candidates.set_item("conditions", &report.candidates.conditions)?;
    candidates.set_item("similarities", &report.candidates.similarities)?;
    dict.set_item("candidates", candidates)?;

    dict.set_item("total_items", report.total_items)?;
    dict.set_item("country_counts", report.country_counts.clone())?;
    dict.set_item("scoring_method", &report.scoring_method)?;
    dict.set_item("latency_ms", report.latency_ms)?;
    dict.set_item("generated_at", report.generated_at.to_rfc3339())?;

    Ok(dict.into())
}

/// Title similarity in [0, 1]
#[pyfunction]
fn similarity(a: &str, b: &str) -> f64 {
    crate::similarity(a, b)
}

/// Price quality rating in [0, 5]
#[pyfunction]
fn quality_rating(initial_price: f64, final_price: f64, days_listed: i64) -> PyResult<f64> {
    crate::quality_rating(initial_price, final_price, days_listed).map_err(to_py_err)
}

/// Percentage difference as (amount, type)
#[pyfunction]
fn percentage_difference(list_price: f64, best_price: f64) -> PyResult<(String, String)> {
    let diff = crate::percentage_difference(list_price, best_price).map_err(to_py_err)?;
    Ok((diff.amount, diff.kind.as_str().to_string()))
}

/// Python module
#[pymodule]
fn pricematch_engine(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<ComparisonEngine>()?;
    m.add_function(wrap_pyfunction!(similarity, m)?)?;
    m.add_function(wrap_pyfunction!(quality_rating, m)?)?;
    m.add_function(wrap_pyfunction!(percentage_difference, m)?)?;
    m.add("__version__", crate::VERSION)?;
    Ok(())
}
