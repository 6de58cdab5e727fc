use std::collections::BTreeMap;

use lockbox_types::LockboxResult;

/// A single already-decoded input row. Byte-level decoding (CSV/JSON/etc.)
/// is out of scope here; an [`InputSource`] hands the Sampler rows that are
/// already a flat string-to-string map.
pub type RawRow = BTreeMap<String, String>;

/// An external row source the Sampler reads from.
///
/// `open`/`close` bracket one `sample()` call; the Sampler never calls
/// `next_row` before `open` or after `close`.
pub trait InputSource {
    fn open(&mut self) -> LockboxResult<()>;
    fn next_row(&mut self) -> Option<RawRow>;
    fn close(&mut self);
}

/// Acquires `source` for the duration of one `sample()` call and releases
/// it on every exit path — including early return on a malformed
/// `SamplerConfig` or once the row budget is exhausted (§4.6 "row-scoped
/// scoped resources").
pub(crate) struct InputGuard<'a> {
    source: &'a mut dyn InputSource,
}

impl<'a> InputGuard<'a> {
    pub(crate) fn open(source: &'a mut dyn InputSource) -> LockboxResult<Self> {
        source.open()?;
        Ok(Self { source })
    }

    pub(crate) fn next_row(&mut self) -> Option<RawRow> {
        self.source.next_row()
    }
}

impl Drop for InputGuard<'_> {
    fn drop(&mut self) {
        self.source.close();
    }
}

/// A fixed in-memory row list, useful for tests and small previews.
pub struct VecInputSource {
    rows: std::vec::IntoIter<RawRow>,
    opened: bool,
}

impl VecInputSource {
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self {
            rows: rows.into_iter(),
            opened: false,
        }
    }
}

impl InputSource for VecInputSource {
    fn open(&mut self) -> LockboxResult<()> {
        self.opened = true;
        Ok(())
    }

    fn next_row(&mut self) -> Option<RawRow> {
        if !self.opened {
            return None;
        }
        self.rows.next()
    }

    fn close(&mut self) {
        self.opened = false;
    }
}
