use serde::Serialize;
use std::time::Duration;

pub fn deserialize_duration_from_millis<'de, D>(d: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let millis: u64 = serde::Deserialize::deserialize(d)?;
    Ok(Duration::from_millis(millis))
}

pub fn serialize_duration_to_millis<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let millis = duration.as_millis() as u64;
    millis.serialize(s)
}
