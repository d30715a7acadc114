//! Replay - load command streams from CSV files.
//!
//! One command per row, with a header:
//!
//! ```text
//! command,order_id,uid,side,type,price,size,timestamp
//! place,1,412,sell,limit,816.00,100,2024-01-02T09:30:00Z
//! move,1,412,,,815.99,,
//! book,,,,,,10,
//! ```
//!
//! Prices are decimals scaled to integer ticks by `price_scale`
//! (100 for cents). Empty fields take their neutral value.

use std::io::Read;

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::command::{CommandType, OrderCommand, OrderType, Side};
use crate::error::ReplayError;

/// Raw CSV row.
#[derive(Debug, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub order_id: Option<u64>,
    pub uid: Option<u64>,
    pub side: Option<String>,
    pub r#type: Option<String>,
    pub price: Option<Decimal>,
    pub size: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl CommandRecord {
    /// Convert to a command for `symbol`, scaling the price by `price_scale`.
    pub fn to_command(&self, line: u64, symbol: u32, price_scale: u64) -> Result<OrderCommand, ReplayError> {
        let command = match self.command.trim().to_ascii_lowercase().as_str() {
            "place" => CommandType::PlaceOrder,
            "cancel" => CommandType::CancelOrder,
            "move" => CommandType::MoveOrder,
            "reduce" => CommandType::ReduceOrder,
            "book" => CommandType::OrderBookRequest,
            "reset" => CommandType::ResetBook,
            other => {
                return Err(ReplayError::InvalidValue {
                    line,
                    field: "command",
                    value: other.to_string(),
                })
            }
        };

        let action = match self.side.as_deref().map(str::trim) {
            None | Some("") => {
                if command == CommandType::PlaceOrder {
                    return Err(ReplayError::MissingField { line, field: "side" });
                }
                Side::Bid
            }
            Some("buy") | Some("bid") => Side::Bid,
            Some("sell") | Some("ask") => Side::Ask,
            Some(other) => {
                return Err(ReplayError::InvalidValue {
                    line,
                    field: "side",
                    value: other.to_string(),
                })
            }
        };

        let order_type = match self.r#type.as_deref().map(str::trim) {
            None | Some("") | Some("limit") | Some("gtc") => OrderType::Limit,
            Some("ioc") => OrderType::Ioc,
            Some("market") => OrderType::Market,
            Some(other) => {
                return Err(ReplayError::InvalidValue {
                    line,
                    field: "type",
                    value: other.to_string(),
                })
            }
        };

        let needs_order_id = matches!(
            command,
            CommandType::PlaceOrder | CommandType::CancelOrder | CommandType::MoveOrder | CommandType::ReduceOrder
        );
        if needs_order_id && self.order_id.is_none() {
            return Err(ReplayError::MissingField { line, field: "order_id" });
        }

        let price = match self.price {
            Some(price) => to_ticks(line, price, price_scale)?,
            None => 0,
        };
        let timestamp = match self.timestamp {
            Some(ts) => ts.timestamp_nanos_opt().ok_or_else(|| ReplayError::InvalidValue {
                line,
                field: "timestamp",
                value: ts.to_rfc3339(),
            })?,
            None => 0,
        };

        Ok(OrderCommand {
            command,
            order_id: self.order_id.unwrap_or(0),
            uid: self.uid.unwrap_or(0),
            symbol,
            price,
            size: self.size.unwrap_or(0),
            action,
            order_type,
            timestamp,
        })
    }
}

/// Scale a decimal price to whole ticks; fractional ticks are refused.
fn to_ticks(line: u64, price: Decimal, price_scale: u64) -> Result<u64, ReplayError> {
    let invalid = || ReplayError::InvalidValue {
        line,
        field: "price",
        value: price.to_string(),
    };
    let scaled = price.checked_mul(Decimal::from(price_scale)).ok_or_else(invalid)?;
    if !scaled.fract().is_zero() {
        return Err(invalid());
    }
    scaled.to_u64().ok_or_else(invalid)
}

/// Read every command from a CSV stream.
pub fn read_commands<R: Read>(reader: R, symbol: u32, price_scale: u64) -> Result<Vec<OrderCommand>, ReplayError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut commands = Vec::new();
    for (row, record) in csv.deserialize::<CommandRecord>().enumerate() {
        // Header is line 1
        let line = row as u64 + 2;
        commands.push(record?.to_command(line, symbol, price_scale)?);
    }
    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
command,order_id,uid,side,type,price,size,timestamp
place,1,412,sell,limit,816.00,100,2024-01-02T09:30:00Z
place,2,413,buy,ioc,816.00,30,
move,1,412,,,815.99,,
reduce,1,412,,,,10,
cancel,1,412,,,,,
book,,,,,,10,
reset,,,,,,,
";

    #[test]
    fn test_read_sample() {
        let commands = read_commands(SAMPLE.as_bytes(), 3, 100).unwrap();
        assert_eq!(commands.len(), 7);

        let first = commands[0];
        assert_eq!(first.command, CommandType::PlaceOrder);
        assert_eq!(first.action, Side::Ask);
        assert_eq!(first.price, 81_600);
        assert_eq!(first.size, 100);
        assert_eq!(first.symbol, 3);
        assert_eq!(first.timestamp, 1_704_187_800_000_000_000);

        assert_eq!(commands[1].order_type, OrderType::Ioc);
        assert_eq!(commands[1].action, Side::Bid);
        assert_eq!(commands[2].command, CommandType::MoveOrder);
        assert_eq!(commands[2].price, 81_599);
        assert_eq!(commands[2].size, 0);
        assert_eq!(commands[3], OrderCommand::reduce(1, 412, 10).with_symbol(3));
        assert_eq!(commands[5].command, CommandType::OrderBookRequest);
        assert_eq!(commands[5].size, 10);
        assert_eq!(commands[6].command, CommandType::ResetBook);
    }

    #[test]
    fn test_fractional_tick_rejected() {
        let csv = "command,order_id,uid,side,type,price,size,timestamp\nplace,1,1,buy,limit,1.005,1,\n";
        let err = read_commands(csv.as_bytes(), 0, 100).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidValue { line: 2, field: "price", .. }));
    }

    #[test]
    fn test_missing_side_and_unknown_command() {
        let csv = "command,order_id,uid,side,type,price,size,timestamp\nplace,1,1,,limit,1,1,\n";
        let err = read_commands(csv.as_bytes(), 0, 1).unwrap_err();
        assert!(matches!(err, ReplayError::MissingField { line: 2, field: "side" }));

        let csv = "command,order_id,uid,side,type,price,size,timestamp\nplace,1,1,buy,,1,1,\nswap,1,1,,,,,\n";
        let err = read_commands(csv.as_bytes(), 0, 1).unwrap_err();
        assert!(matches!(err, ReplayError::InvalidValue { line: 3, field: "command", .. }));
    }

    #[test]
    fn test_malformed_number_is_csv_error() {
        let csv = "command,order_id,uid,side,type,price,size,timestamp\nplace,x,1,buy,,1,1,\n";
        assert!(matches!(read_commands(csv.as_bytes(), 0, 1), Err(ReplayError::Csv(_))));
    }
}
