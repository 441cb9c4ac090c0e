//! Bounded side channel that mirrors every emitted row as a literal `INSERT`
//! statement.
//!
//! The walker is the only producer. Sends block while the channel is full, so
//! the receiving side has to be drained concurrently (usually from another
//! thread) until the sender is dropped. Drop the sender only after the last
//! simulation has been walked; statements can arrive before the batch that
//! holds their row is committed.

use std::io::{self, Write};
use std::sync::mpsc::{self, Receiver, SyncSender};

use crate::error::{Result, StoreError};

pub fn channel(capacity: usize) -> (HistorySender, HistoryReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (HistorySender { tx }, HistoryReceiver { rx })
}

#[derive(Debug)]
pub struct HistorySender {
    tx: SyncSender<String>,
}

impl HistorySender {
    /// Blocks until the statement fits into the channel.
    pub fn send(&self, statement: String) -> Result<()> {
        self.tx
            .send(statement)
            .map_err(|_| StoreError::HistoryClosed)
    }
}

#[derive(Debug)]
pub struct HistoryReceiver {
    rx: Receiver<String>,
}

impl HistoryReceiver {
    /// Waits for the next statement; `None` once every sender is gone.
    pub fn recv(&self) -> Option<String> {
        self.rx.recv().ok()
    }

    /// Writes one statement per line until the sender is dropped, returning
    /// how many statements were written.
    pub fn drain_into<W: Write>(self, mut out: W) -> io::Result<u64> {
        let mut written = 0_u64;
        for statement in self {
            writeln!(out, "{statement}")?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }
}

impl IntoIterator for HistoryReceiver {
    type Item = String;
    type IntoIter = mpsc::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn drain_stops_when_sender_is_dropped() {
        let (tx, rx) = channel(1);
        let consumer = thread::spawn(move || {
            let mut out = Vec::new();
            let count = rx.drain_into(&mut out).expect("write to vec");
            (count, String::from_utf8(out).expect("utf8"))
        });

        for idx in 0..5 {
            tx.send(format!("stmt {idx};")).expect("consumer is alive");
        }
        drop(tx);

        let (count, text) = consumer.join().expect("consumer thread");
        assert_eq!(count, 5);
        assert_eq!(text.lines().count(), 5);
        assert!(text.starts_with("stmt 0;"));
    }

    #[test]
    fn send_fails_after_receiver_hangs_up() {
        let (tx, rx) = channel(4);
        drop(rx);
        let err = tx.send("stmt;".to_string()).expect_err("receiver is gone");
        assert!(matches!(err, StoreError::HistoryClosed));
    }
}
