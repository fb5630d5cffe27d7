use textmap_core::error::TextmapError;
use textmap_core::export::ExportRecord;

pub fn print(record: &ExportRecord) -> Result<(), TextmapError> {
    let json = serde_json::to_string_pretty(record)?;
    println!("{json}");
    Ok(())
}
