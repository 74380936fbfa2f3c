//! The task request: what to fetch, what to run, what to store back.

use serde::{Deserialize, Deserializer, Serialize};

/// Object-store coordinates shared by every input and output of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOptions {
    /// The bucket holding inputs, the executable and outputs.
    pub bucket: String,
    /// Key prefix; objects live at `prefix/name`.
    #[serde(default)]
    pub prefix: String,
}

/// A named file reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// File name relative to the prefix and to the working area.
    pub name: String,
}

impl FileRef {
    /// Creates a file reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Description of one task instance.
///
/// Immutable once constructed; a pipeline owns exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequest {
    /// Executable name, fetched from `prefix/executable`.
    pub executable: String,
    /// Arguments passed to the executable.
    #[serde(default, deserialize_with = "deserialize_args")]
    pub args: Vec<String>,
    /// Bucket and prefix.
    pub options: StorageOptions,
    /// Declared inputs, in order.
    #[serde(default)]
    pub inputs: Vec<FileRef>,
    /// Declared outputs, in order.
    #[serde(default)]
    pub outputs: Vec<FileRef>,
    /// File in the working area that receives a copy of standard output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Log destination name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_name: Option<String>,
}

/// Workflow engines send numbers and booleans as arguments too.
fn deserialize_args<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(values
        .unwrap_or_default()
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

impl TaskRequest {
    /// Creates a request with no arguments, inputs or outputs.
    #[must_use]
    pub fn new(
        executable: impl Into<String>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            options: StorageOptions {
                bucket: bucket.into(),
                prefix: prefix.into(),
            },
            inputs: Vec::new(),
            outputs: Vec::new(),
            stdout: None,
            log_name: None,
        }
    }

    /// Appends an argument.
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a declared input.
    #[must_use]
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(FileRef::new(name));
        self
    }

    /// Appends a declared output.
    #[must_use]
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(FileRef::new(name));
        self
    }

    /// Sets the stdout capture file.
    #[must_use]
    pub fn with_stdout(mut self, name: impl Into<String>) -> Self {
        self.stdout = Some(name.into());
        self
    }

    /// Parses a request from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.options.bucket
    }

    /// Returns the key prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.options.prefix
    }

    /// Names of the declared inputs.
    #[must_use]
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.iter().map(|f| f.name.clone()).collect()
    }

    /// Names of the declared outputs.
    #[must_use]
    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|f| f.name.clone()).collect()
    }

    /// Everything fetched by stage-in: the declared inputs plus the executable.
    #[must_use]
    pub fn stage_in_names(&self) -> Vec<String> {
        let mut names = self.input_names();
        names.push(self.executable.clone());
        names
    }

    /// The stdout capture file, ignoring an empty name.
    #[must_use]
    pub fn stdout_capture(&self) -> Option<&str> {
        self.stdout.as_deref().filter(|name| !name.is_empty())
    }
}
