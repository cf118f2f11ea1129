//! Record-list encoding of bar series

use finagent_market::{Bar, Series};
use serde_json::{Map, Value};

/// A bar field a caller may select
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Time,
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Column {
    pub const ALL: [Column; 6] = [
        Column::Time,
        Column::Open,
        Column::High,
        Column::Low,
        Column::Close,
        Column::Volume,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Column::Time => "time",
            Column::Open => "open",
            Column::High => "high",
            Column::Low => "low",
            Column::Close => "close",
            Column::Volume => "volume",
        }
    }

    fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// `time` is epoch milliseconds
    fn value(self, bar: &Bar) -> Value {
        match self {
            Column::Time => Value::from(bar.time.timestamp_millis()),
            Column::Open => Value::from(bar.open),
            Column::High => Value::from(bar.high),
            Column::Low => Value::from(bar.low),
            Column::Close => Value::from(bar.close),
            Column::Volume => Value::from(bar.volume),
        }
    }
}

/// Validate a column selection
///
/// No selection means every column. `time` always comes first; the rest keep
/// the caller's order without repeats.
pub fn select_columns(requested: Option<&[String]>) -> Result<Vec<Column>, String> {
    let Some(requested) = requested.filter(|r| !r.is_empty()) else {
        return Ok(Column::ALL.to_vec());
    };

    let invalid: Vec<&str> = requested
        .iter()
        .map(|c| c.trim())
        .filter(|c| Column::parse(c).is_none())
        .collect();
    if !invalid.is_empty() {
        let available: Vec<&str> = Column::ALL.iter().map(|c| c.as_str()).collect();
        return Err(format!(
            "Cột không hợp lệ: {}. Các cột có sẵn: {}",
            invalid.join(", "),
            available.join(", ")
        ));
    }

    let mut columns = vec![Column::Time];
    for column in requested.iter().filter_map(|c| Column::parse(c.trim())) {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    Ok(columns)
}

/// A named indicator column aligned with the series
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Encode `series` as a JSON array of records, as a string
///
/// Each record holds `columns` in order followed by the indicator columns;
/// missing indicator values are `null`.
pub fn encode_records(series: &Series, columns: &[Column], indicators: &[IndicatorColumn]) -> String {
    let rows: Vec<Value> = series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let mut record = Map::new();
            for column in columns {
                record.insert(column.as_str().to_string(), column.value(bar));
            }
            for indicator in indicators {
                let value = indicator
                    .values
                    .get(i)
                    .copied()
                    .flatten()
                    .map_or(Value::Null, Value::from);
                record.insert(indicator.name.clone(), value);
            }
            Value::Object(record)
        })
        .collect();
    Value::Array(rows).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn series() -> Series {
        Series::new(vec![
            Bar {
                time: Utc.with_ymd_and_hms(2025, 3, 13, 0, 0, 0).unwrap(),
                open: 25.1,
                high: 25.8,
                low: 24.9,
                close: 25.5,
                volume: 1_200_000,
            },
            Bar {
                time: Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap(),
                open: 25.5,
                high: 26.0,
                low: 25.2,
                close: 25.9,
                volume: 980_000,
            },
        ])
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_select_columns() {
        assert_eq!(select_columns(None).unwrap(), Column::ALL.to_vec());
        assert_eq!(
            select_columns(Some(names(&[]).as_slice())).unwrap(),
            Column::ALL.to_vec()
        );

        let picked = select_columns(Some(names(&["close", "volume"]).as_slice())).unwrap();
        assert_eq!(picked, vec![Column::Time, Column::Close, Column::Volume]);

        let picked = select_columns(Some(names(&["close", "time"]).as_slice())).unwrap();
        assert_eq!(picked, vec![Column::Time, Column::Close]);
    }

    #[test]
    fn test_select_columns_rejects_unknown() {
        let err = select_columns(Some(names(&["close", "price", "vol"]).as_slice())).unwrap_err();
        assert_eq!(
            err,
            "Cột không hợp lệ: price, vol. Các cột có sẵn: time, open, high, low, close, volume"
        );
    }

    #[test]
    fn test_encode_records() {
        let encoded = encode_records(
            &series(),
            &[Column::Time, Column::Close],
            &[IndicatorColumn {
                name: "SMA_2".to_string(),
                values: vec![None, Some(25.7)],
            }],
        );
        assert_eq!(
            encoded,
            r#"[{"time":1741824000000,"close":25.5,"SMA_2":null},{"time":1741910400000,"close":25.9,"SMA_2":25.7}]"#
        );
    }
}
