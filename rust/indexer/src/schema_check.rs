use tessera_types::FieldSchema;

/// Whether an existing collection's fields are compatible with the desired
/// ones: same length, and the same name and data type at every position.
/// Creation hints (primary key flag, lengths, descriptions) are ignored since
/// stores tend to normalise them.
pub fn fields_match(remote: &[FieldSchema], desired: &[FieldSchema]) -> bool {
    remote.len() == desired.len()
        && remote
            .iter()
            .zip(desired)
            .all(|(r, d)| r.name == d.name && r.data_type == d.data_type)
}
