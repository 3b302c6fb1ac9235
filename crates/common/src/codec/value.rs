//! Hand-written serializers and deserialize seeds for the building blocks of
//! wire records: polymorphic values, argument arrays, variable maps and dates.

use crate::codec::Codec;
use chrono::{DateTime, Utc};
use resque_domain::{Value, ValueMap};
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// Serializes a borrowed [`Value`] as plain JSON.
pub struct WireValue<'a>(pub &'a Value);

impl Serialize for WireValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => WireArray(items).serialize(serializer),
            Value::Object(map) => WireObject(map).serialize(serializer),
        }
    }
}

/// Serializes a slice of values as a JSON array.
pub struct WireArray<'a>(pub &'a [Value]);

impl Serialize for WireArray<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for item in self.0 {
            seq.serialize_element(&WireValue(item))?;
        }
        seq.end()
    }
}

/// Serializes a value map as a JSON object, keys in insertion order.
pub struct WireObject<'a>(pub &'a ValueMap);

impl Serialize for WireObject<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in self.0 {
            map.serialize_entry(key, &WireValue(value))?;
        }
        map.end()
    }
}

/// Reads any JSON value into a [`Value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueSeed;

impl<'de> DeserializeSeed<'de> for ValueSeed {
    type Value = Value;

    fn deserialize<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v)
            .map(Value::Int)
            .unwrap_or(Value::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        ValueSeed.deserialize(deserializer)
    }

    fn visit_seq<A>(self, seq: A) -> Result<Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        ArrayVisitor.visit_seq(seq).map(Value::Array)
    }

    fn visit_map<A>(self, map: A) -> Result<Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        ObjectVisitor.visit_map(map).map(Value::Object)
    }
}

/// Reads a JSON array of values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraySeed;

impl<'de> DeserializeSeed<'de> for ArraySeed {
    type Value = Vec<Value>;

    fn deserialize<D>(self, deserializer: D) -> Result<Vec<Value>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(ArrayVisitor)
    }
}

struct ArrayVisitor;

impl<'de> Visitor<'de> for ArrayVisitor {
    type Value = Vec<Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Vec<Value>, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(ValueSeed)? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Reads a JSON object of values, keeping key order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectSeed;

impl<'de> DeserializeSeed<'de> for ObjectSeed {
    type Value = ValueMap;

    fn deserialize<D>(self, deserializer: D) -> Result<ValueMap, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ObjectVisitor)
    }
}

struct ObjectVisitor;

impl<'de> Visitor<'de> for ObjectVisitor {
    type Value = ValueMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<ValueMap, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut values = ValueMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(ValueSeed)?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

/// Reads a date string with the codec's parse strategies.
#[derive(Clone, Copy)]
pub struct DateSeed<'c> {
    codec: &'c Codec,
}

impl<'c> DateSeed<'c> {
    /// Seed bound to `codec`.
    pub fn new(codec: &'c Codec) -> Self {
        Self { codec }
    }
}

impl<'de> DeserializeSeed<'de> for DateSeed<'_> {
    type Value = DateTime<Utc>;

    fn deserialize<D>(self, deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_str(self)
    }
}

impl<'de> Visitor<'de> for DateSeed<'_> {
    type Value = DateTime<Utc>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a date string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<DateTime<Utc>, E> {
        self.codec.parse_date(v).map_err(E::custom)
    }
}

/// Lifts a seed over JSON `null`: `null` reads as `None`.
#[derive(Clone, Copy)]
pub struct OptionSeed<S>(pub S);

impl<'de, S> DeserializeSeed<'de> for OptionSeed<S>
where
    S: DeserializeSeed<'de>,
{
    type Value = Option<S::Value>;

    fn deserialize<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_option(self)
    }
}

impl<'de, S> Visitor<'de> for OptionSeed<S>
where
    S: DeserializeSeed<'de>,
{
    type Value = Option<S::Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an optional value")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        self.0.deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(json: &str) -> Value {
        let mut de = serde_json::Deserializer::from_str(json);
        ValueSeed.deserialize(&mut de).unwrap()
    }

    fn write(value: &Value) -> String {
        serde_json::to_string(&WireValue(value)).unwrap()
    }

    #[test]
    fn test_numbers_keep_their_kind() {
        assert_eq!(read("1"), Value::Int(1));
        assert_eq!(read("-7"), Value::Int(-7));
        assert_eq!(read("1.0"), Value::Float(1.0));
        assert_eq!(read("18446744073709551615"), Value::Float(u64::MAX as f64));
    }

    #[test]
    fn test_object_keeps_key_order() {
        let value = read(r#"{"z":1,"a":[true,null,"x"],"m":{"k":2.5}}"#);
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert_eq!(write(&value), r#"{"z":1,"a":[true,null,"x"],"m":{"k":2.5}}"#);
    }

    #[test]
    fn test_option_seed_reads_null_as_none() {
        let mut de = serde_json::Deserializer::from_str("null");
        assert_eq!(OptionSeed(ArraySeed).deserialize(&mut de).unwrap(), None);

        let mut de = serde_json::Deserializer::from_str("[1]");
        assert_eq!(
            OptionSeed(ArraySeed).deserialize(&mut de).unwrap(),
            Some(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_array_seed_rejects_objects() {
        let mut de = serde_json::Deserializer::from_str("{}");
        assert!(ArraySeed.deserialize(&mut de).is_err());
    }
}
