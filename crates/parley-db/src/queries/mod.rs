mod conversations;
mod messages;
mod relations;
mod sequences;

fn require_id(field: &str, value: &str) -> crate::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::StoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
