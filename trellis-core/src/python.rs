//! Python Bindings
//!
//! Exposes the engine as the `_core` extension module. Python callables are
//! registered by qualified name in a `Registry`; a `Config` wraps a node
//! graph decoded from JSON and can be called like the callable it
//! describes.
//!
//! Values cross the boundary as follows: `None`, `bool`, `int`, `float`,
//! `str`, `list` and `dict` with string keys map to the matching literals
//! (a `tuple` becomes a list, so configs inside it are still resolved);
//! `Config` objects map to nodes; anything else travels as an opaque value
//! and comes back as the same Python object.

use std::sync::Arc;

use pyo3::exceptions::{PyKeyError, PyRuntimeError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBool, PyDict, PyFloat, PyInt, PyList, PyString, PyTuple};

use crate::codec::Codec;
use crate::error::Error;
use crate::graph::{Args, Callable, Node, Registry, Resolver};
use crate::value::{Map, Opaque, Value};

fn to_py_err(err: Error) -> PyErr {
    match err {
        Error::Target(inner) => match inner.downcast::<PyErr>() {
            Ok(py_err) => *py_err,
            Err(other) => PyRuntimeError::new_err(other.to_string()),
        },
        Error::Reference { name } => PyKeyError::new_err(name),
        err @ (Error::Config(_) | Error::Format(_) | Error::Json(_)) => {
            PyValueError::new_err(err.to_string())
        }
        Error::Serialization(message) => PyTypeError::new_err(message),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

fn to_python(py: Python<'_>, value: &Value) -> PyResult<PyObject> {
    Ok(match value {
        Value::Null => py.None(),
        Value::Bool(b) => (*b).into_py(py),
        Value::Int(i) => (*i).into_py(py),
        Value::Float(x) => (*x).into_py(py),
        Value::Str(s) => s.as_str().into_py(py),
        Value::List(items) => {
            let items = items
                .iter()
                .map(|item| to_python(py, item))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new_bound(py, items).into_any().unbind()
        }
        Value::Map(map) => {
            let dict = PyDict::new_bound(py);
            for (key, item) in map {
                dict.set_item(key, to_python(py, item)?)?;
            }
            dict.into_any().unbind()
        }
        Value::Node(node) => Py::new(py, PyConfig { node: node.clone() })?.into_py(py),
        Value::Opaque(opaque) => match opaque.downcast_ref::<PyObject>() {
            Some(object) => object.clone_ref(py),
            None => {
                return Err(PyTypeError::new_err(format!(
                    "{} value cannot be passed to Python",
                    opaque.type_name()
                )))
            }
        },
    })
}

fn from_python(object: &Bound<'_, PyAny>) -> PyResult<Value> {
    if object.is_none() {
        return Ok(Value::Null);
    }
    if object.is_instance_of::<PyBool>() {
        return Ok(Value::Bool(object.extract()?));
    }
    if object.is_instance_of::<PyInt>() {
        if let Ok(i) = object.extract::<i64>() {
            return Ok(Value::Int(i));
        }
    } else if object.is_instance_of::<PyFloat>() {
        return Ok(Value::Float(object.extract()?));
    } else if object.is_instance_of::<PyString>() {
        return Ok(Value::Str(object.extract()?));
    } else if let Ok(config) = object.downcast::<PyConfig>() {
        return Ok(Value::Node(config.get().node.clone()));
    } else if let Ok(list) = object.downcast::<PyList>() {
        return list
            .iter()
            .map(|item| from_python(&item))
            .collect::<PyResult<Vec<_>>>()
            .map(Value::List);
    } else if let Ok(tuple) = object.downcast::<PyTuple>() {
        return tuple
            .iter()
            .map(|item| from_python(&item))
            .collect::<PyResult<Vec<_>>>()
            .map(Value::List);
    } else if let Ok(dict) = object.downcast::<PyDict>() {
        if let Some(map) = dict_to_map(dict)? {
            return Ok(Value::Map(map));
        }
    }
    Ok(Value::Opaque(Opaque::new(object.clone().unbind())))
}

/// Convert a dict with string keys; `None` if any key is not a string.
fn dict_to_map(dict: &Bound<'_, PyDict>) -> PyResult<Option<Map>> {
    let mut map = Map::with_capacity(dict.len());
    for (key, item) in dict.iter() {
        let Ok(key) = key.extract::<String>() else {
            return Ok(None);
        };
        map.insert(key, from_python(&item)?);
    }
    Ok(Some(map))
}

fn python_callable(name: &str, func: PyObject) -> Callable {
    Callable::new(name, move |args: Args| {
        Python::with_gil(|py| {
            let (positional, named) = args.into_parts();
            let positional = positional
                .iter()
                .map(|value| to_python(py, value))
                .collect::<PyResult<Vec<_>>>()?;
            let kwargs = PyDict::new_bound(py);
            for (key, value) in &named {
                kwargs.set_item(key, to_python(py, value)?)?;
            }

            let result = func
                .bind(py)
                .call(PyTuple::new_bound(py, positional), Some(&kwargs))?;
            from_python(&result)
        })
        .map_err(Into::into)
    })
}

/// Name-to-callable table for Python targets.
#[pyclass(name = "Registry")]
pub struct PyRegistry {
    inner: Registry,
}

#[pymethods]
impl PyRegistry {
    #[new]
    fn new() -> Self {
        Self {
            inner: Registry::new(),
        }
    }

    /// Register a Python callable under a qualified name.
    fn register(&mut self, name: &str, func: PyObject) -> PyResult<()> {
        self.inner
            .register_callable(python_callable(name, func))
            .map_err(to_py_err)
    }

    /// Register a config under a qualified name.
    fn register_config(&mut self, name: &str, config: PyRef<'_, PyConfig>) -> PyResult<()> {
        self.inner
            .register_node(name, config.node.clone())
            .map_err(to_py_err)
    }

    fn names(&self) -> Vec<String> {
        self.inner.names().map(str::to_string).collect()
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __contains__(&self, name: &str) -> bool {
        self.inner.contains(name)
    }
}

/// A node graph, callable from Python.
#[pyclass(name = "Config", frozen)]
pub struct PyConfig {
    node: Arc<Node>,
}

#[pymethods]
impl PyConfig {
    /// Decode a config from JSON text.
    #[staticmethod]
    fn from_json(registry: PyRef<'_, PyRegistry>, json: &str) -> PyResult<Self> {
        let node = Codec::new(&registry.inner).from_json(json).map_err(to_py_err)?;
        Ok(Self {
            node: Arc::new(node),
        })
    }

    /// Load a config from a `.json`, `.msgpack` or `.mpk` file.
    #[staticmethod]
    fn load(registry: PyRef<'_, PyRegistry>, path: &str) -> PyResult<Self> {
        let node = Codec::new(&registry.inner).load(path).map_err(to_py_err)?;
        Ok(Self {
            node: Arc::new(node),
        })
    }

    fn to_json(&self, registry: PyRef<'_, PyRegistry>) -> PyResult<String> {
        Codec::new(&registry.inner)
            .to_json(&self.node)
            .map_err(to_py_err)
    }

    fn save(&self, registry: PyRef<'_, PyRegistry>, path: &str) -> PyResult<()> {
        Codec::new(&registry.inner)
            .save(&self.node, path)
            .map_err(to_py_err)
    }

    /// Resolve the config. Extra arguments are applied as call-time
    /// overrides.
    #[pyo3(signature = (registry, *args, **kwargs))]
    fn __call__(
        &self,
        py: Python<'_>,
        registry: PyRef<'_, PyRegistry>,
        args: &Bound<'_, PyTuple>,
        kwargs: Option<&Bound<'_, PyDict>>,
    ) -> PyResult<PyObject> {
        let positional = args
            .iter()
            .map(|item| from_python(&item))
            .collect::<PyResult<Vec<_>>>()?;
        let named = match kwargs {
            Some(dict) => dict_to_map(dict)?.unwrap_or_default(),
            None => Map::new(),
        };

        let value = Resolver::with_registry(&registry.inner)
            .resolve_with(&self.node, Args::new(positional, named))
            .map_err(to_py_err)?;
        to_python(py, &value)
    }

    /// Flattened `key | argument` table of the config.
    fn flatten(&self) -> String {
        self.node.flatten().to_string()
    }

    #[getter]
    fn target(&self) -> Option<String> {
        self.node.target().name().map(str::to_string)
    }

    #[getter]
    fn self_build(&self) -> bool {
        self.node.is_auto()
    }

    fn __repr__(&self) -> String {
        format!(
            "Config(obj={}, self_build={})",
            self.node.target().display_name(),
            if self.node.is_auto() { "True" } else { "False" }
        )
    }
}

/// Python module definition.
///
/// This function is called by Python when importing the module.
/// It registers all Python-exposed types.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyRegistry>()?;
    m.add_class::<PyConfig>()?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
