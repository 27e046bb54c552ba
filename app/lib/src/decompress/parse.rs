//! Compressed line to [`DecompressionRecord`].
//!
//! Numeric and address fields are staged as text; replacement markers copy
//! the previous record's field, and replaced rrsets are deep-copied into the
//! current record so each copy can be reordered on its own.

use crate::codec::NumberFormat;
use crate::config::{CodecConfig, HIDDEN_FIELD_MAX_WIDTH, REPLACEMENT_MARKER};
use crate::error::{DnslzError, Result};
use crate::pool::{AddressRecord, RecordPool};
use crate::record::{
    DecompressionRecord, RrElement, RrSet, Slot, GROUP_TYPE_LIMIT, MAX_ALLOWED_RRSET_SIZE, TYPE_A,
    TYPE_AAAA,
};
use crate::tokenizer::Row;

fn is_marker(text: &[u8]) -> bool {
    text == [REPLACEMENT_MARKER]
}

/// Under field hiding, the query name is the first column after the server
/// that is either longer than any numeric field or the marker.
fn is_qname_column(text: &[u8]) -> bool {
    text.len() > HIDDEN_FIELD_MAX_WIDTH || is_marker(text)
}

struct Columns<'r, 'a> {
    row: &'r Row<'a>,
    line: u64,
}

impl<'a> Columns<'_, 'a> {
    fn get(&self, index: usize, what: &str) -> Result<&'a [u8]> {
        self.row.get(index).ok_or_else(|| {
            DnslzError::mismatch(format!("line {}: missing {}", self.line, what))
        })
    }

    fn error(&self, reason: impl std::fmt::Display) -> DnslzError {
        DnslzError::mismatch(format!("line {}: {}", self.line, reason))
    }
}

/// Parser state fixed for a pipeline run.
#[derive(Debug, Clone, Copy)]
pub(super) struct RecordParser {
    format: NumberFormat,
    hiding: bool,
    replacement: bool,
}

impl RecordParser {
    pub(super) fn new(config: &CodecConfig) -> Self {
        Self {
            format: NumberFormat::for_config(config),
            hiding: config.functions.field_hiding(),
            replacement: config.functions.field_replacement(),
        }
    }

    pub(super) fn parse(&self, row: &Row<'_>, slot: Slot<'_, DecompressionRecord>) -> Result<()> {
        let Slot {
            previous,
            current,
            pool,
        } = slot;
        let cols = Columns {
            row,
            line: row.line_number(),
        };

        let timestamp = cols.get(0, "timestamp")?;
        current.base.timestamp =
            self.format
                .read_bounded(timestamp, u32::MAX as u64, "timestamp")? as u32;

        self.copy_field(
            &cols,
            1,
            "client address",
            previous.map(|p| p.client_text.as_slice()),
            &mut current.client_text,
        )?;
        self.copy_field(
            &cols,
            2,
            "server address",
            previous.map(|p| p.server_text.as_slice()),
            &mut current.server_text,
        )?;

        // Locate the query name; hidden fields stay empty.
        let mut index = 3;
        let first = cols.get(index, "query name")?;
        if !(self.hiding && is_qname_column(first)) {
            stage_number(&cols, first, "query type", &mut current.qtype_text)?;
            index += 1;
            let second = cols.get(index, "query name")?;
            if !(self.hiding && is_qname_column(second)) {
                stage_number(&cols, second, "response code", &mut current.rcode_text)?;
                index += 1;
            }
        }
        self.copy_field(
            &cols,
            index,
            "query name",
            previous.map(|p| p.base.qname.as_slice()),
            &mut current.base.qname,
        )?;
        index += 1;

        let prev_base = previous.map(|p| &p.base);
        let base = &mut current.base;
        let mut last_rank = None;
        while index < row.len() {
            let tag = cols.get(index, "group type")?;
            let rtype = self
                .format
                .read_bounded(tag, (GROUP_TYPE_LIMIT - 1) as u64, "group type")? as u8;
            let rank = match rtype {
                TYPE_A => 1,
                TYPE_AAAA => 2,
                _ => 0,
            };
            if rtype == 0 || last_rank.is_some_and(|last| last >= rank) {
                return Err(cols.error(format!("unexpected group type {}", rtype)));
            }
            last_rank = Some(rank);

            let head = index + 1;
            index = match rank {
                0 => {
                    let prev = prev_base.map(|p| &p.cnames);
                    let (set, next) = self.group(&cols, head, rtype, prev, pool, stage_name)?;
                    base.cnames = set;
                    next
                }
                1 => {
                    let prev = prev_base.map(|p| &p.addr4);
                    let (set, next) = self.group(&cols, head, rtype, prev, pool, stage_answer)?;
                    base.addr4 = set;
                    next
                }
                _ => {
                    let prev = prev_base.map(|p| &p.addr6);
                    let (set, next) = self.group(&cols, head, rtype, prev, pool, stage_answer)?;
                    base.addr6 = set;
                    next
                }
            };
        }
        Ok(())
    }

    /// Copy column `index` into `field`, resolving a replacement marker.
    fn copy_field(
        &self,
        cols: &Columns<'_, '_>,
        index: usize,
        what: &str,
        previous: Option<&[u8]>,
        field: &mut Vec<u8>,
    ) -> Result<()> {
        let text = cols.get(index, what)?;
        if is_marker(text) {
            if !self.replacement {
                return Err(cols.error(format!(
                    "replacement marker for {} while replacement is off",
                    what
                )));
            }
            let prev = previous.ok_or_else(|| {
                cols.error(format!("{} replaced in the first record of a chunk", what))
            })?;
            field.extend_from_slice(prev);
        } else {
            field.extend_from_slice(text);
        }
        Ok(())
    }

    /// Read one answer group whose count column is at `head`.
    ///
    /// Returns the set and the index of the column after the group.
    fn group<T: RrElement>(
        &self,
        cols: &Columns<'_, '_>,
        head: usize,
        rtype: u8,
        previous: Option<&RrSet<T>>,
        pool: &mut RecordPool,
        stage: fn(&mut T, &[u8]),
    ) -> Result<(RrSet<T>, usize)> {
        let text = cols.get(head, "group count")?;
        if is_marker(text) {
            if !self.replacement {
                return Err(cols.error("replaced rrset while replacement is off"));
            }
            return match previous {
                Some(prev) if !prev.is_empty() && prev.rtype() == rtype => {
                    Ok((prev.duplicate(pool)?, head + 1))
                }
                _ => Err(cols.error(format!(
                    "type {} rrset replaced without a previous set",
                    rtype
                ))),
            };
        }

        let count = self
            .format
            .read_bounded(text, MAX_ALLOWED_RRSET_SIZE as u64, "group count")? as usize;
        if count == 0 {
            return Err(cols.error("empty answer group"));
        }
        let values = head + 1;
        let end = values + count;
        if end > cols.row.len() {
            return Err(cols.error(format!(
                "group announces {} values, found {}",
                count,
                cols.row.len() - values
            )));
        }
        let set = RrSet::allocate(pool, rtype, count as u8)?;
        for (i, element) in set.elements_mut(pool).iter_mut().enumerate() {
            stage(element, cols.get(values + i, "answer value")?);
        }
        Ok((set, end))
    }
}

fn stage_number(
    cols: &Columns<'_, '_>,
    text: &[u8],
    what: &str,
    field: &mut Vec<u8>,
) -> Result<()> {
    if text.is_empty() {
        return Err(cols.error(format!("empty {}", what)));
    }
    field.extend_from_slice(text);
    Ok(())
}

fn stage_name(name: &mut Vec<u8>, text: &[u8]) {
    name.extend_from_slice(text);
}

fn stage_answer(answer: &mut AddressRecord, text: &[u8]) {
    answer.text_staging.extend_from_slice(text);
}
