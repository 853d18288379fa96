use std::path::PathBuf;

pub const DATA_FILE_NAME: &str = "todo_data.json";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("tally")
}

/// Default location of the data file. The store creates the directory
/// on first write.
pub fn default_data_file() -> PathBuf {
    default_data_dir().join(DATA_FILE_NAME)
}
