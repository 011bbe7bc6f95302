//! Serde adapters for values JSON cannot carry natively.
//!
//! Durations travel as integer milliseconds; NaN travels as `null`.

/// `chrono::Duration` as integer milliseconds.
pub mod duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::milliseconds(i64::deserialize(d)?))
    }
}

/// `Option<chrono::Duration>` as optional integer milliseconds.
pub mod option_duration_ms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.num_milliseconds()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(d)?.map(Duration::milliseconds))
    }
}

/// `Vec<f64>` with NaN encoded as `null`.
pub mod nan_vec {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Option<f64>> = values
            .iter()
            .map(|&v| if v.is_finite() { Some(v) } else { None })
            .collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let encoded = Vec::<Option<f64>>::deserialize(d)?;
        Ok(encoded.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    }
}

/// Column-major `Vec<Vec<f64>>` with NaN encoded as `null`.
pub mod nan_matrix {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(values: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<Vec<Option<f64>>> = values
            .iter()
            .map(|col| {
                col.iter()
                    .map(|&v| if v.is_finite() { Some(v) } else { None })
                    .collect()
            })
            .collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let encoded = Vec::<Vec<Option<f64>>>::deserialize(d)?;
        Ok(encoded
            .into_iter()
            .map(|col| col.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::duration_ms")]
        span: Duration,
        #[serde(with = "super::nan_vec")]
        values: Vec<f64>,
    }

    #[test]
    fn nan_and_duration_survive_json() {
        let holder = Holder {
            span: Duration::hours(2),
            values: vec![1.0, f64::NAN, 3.0],
        };
        let json = serde_json::to_string(&holder).unwrap();
        assert_eq!(json, r#"{"span":7200000,"values":[1.0,null,3.0]}"#);

        let back: Holder = serde_json::from_str(&json).unwrap();
        assert_eq!(back.span, Duration::hours(2));
        assert!(back.values[1].is_nan());
        assert_eq!(back.values[2], 3.0);
    }
}
