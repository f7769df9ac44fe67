use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRow {
    pub order: String,
    pub user: u64,
    pub customer: String,
    pub status: &'static str,
    pub total: String,
    pub items: usize,
    pub payments: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRow {
    pub payment: String,
    pub order: String,
    pub method: &'static str,
    pub amount: String,
    pub status: &'static str,
    pub transaction_id: String,
}

/// Writes the final ledger: the orders table, a blank line, then the
/// payments table. Each table carries its own header.
pub struct LedgerWriter<W: Write> {
    sink: W,
}

impl<W: Write> LedgerWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write_ledger(&mut self, orders: &[OrderRow], payments: &[PaymentRow]) -> Result<()> {
        write_table(&mut self.sink, orders, &OrderRow::HEADER)?;
        writeln!(self.sink)?;
        write_table(&mut self.sink, payments, &PaymentRow::HEADER)?;
        self.sink.flush()?;
        Ok(())
    }
}

impl OrderRow {
    const HEADER: [&'static str; 7] = [
        "order", "user", "customer", "status", "total", "items", "payments",
    ];
}

impl PaymentRow {
    const HEADER: [&'static str; 6] = [
        "payment",
        "order",
        "method",
        "amount",
        "status",
        "transaction_id",
    ];
}

// Headers are written explicitly so an empty table still has one.
fn write_table<W: Write, T: Serialize>(sink: &mut W, rows: &[T], header: &[&str]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(sink);
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
