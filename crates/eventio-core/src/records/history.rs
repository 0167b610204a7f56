// crates/eventio-core/src/records/history.rs

use std::io::Write;

use crate::block::{Block, BlockWriter};
use crate::error::Result;
use crate::records::types::{HISTORY, HISTORY_COMMAND_LINE, HISTORY_CONFIG};
use crate::records::{check_block, check_header};

/// A line of history with the unix time it was recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryLine {
    pub time: i64,
    pub text: String,
}

/// Processing history (container 70). Holds an optional command line
/// (sub-block 71) and any number of configuration lines (sub-block 72),
/// each laid out as time:i32 text:string.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    pub ident: i64,
    pub command_line: Option<HistoryLine>,
    pub config: Vec<HistoryLine>,
}

impl History {
    pub fn new(ident: i64, command_line: &str, time: i64) -> Self {
        Self {
            ident,
            command_line: Some(HistoryLine {
                time,
                text: command_line.to_string(),
            }),
            config: Vec::new(),
        }
    }

    pub fn push_config(&mut self, text: &str, time: i64) {
        self.config.push(HistoryLine {
            time,
            text: text.to_string(),
        });
    }

    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, HISTORY, 1)?;
        let mut c = block.cursor();
        let mut hist = History {
            ident: block.ident(),
            ..Default::default()
        };
        while let Some(sub) = c.open_next()? {
            let line = HistoryLine {
                time: c.get::<i32>()? as i64,
                text: c.get_string()?,
            };
            match sub.type_code {
                HISTORY_COMMAND_LINE => {
                    check_header(&sub, HISTORY_COMMAND_LINE, 1)?;
                    hist.command_line = Some(line);
                }
                _ => {
                    check_header(&sub, HISTORY_CONFIG, 1)?;
                    hist.config.push(line);
                }
            }
            c.close_sub_block(&sub)?;
        }
        Ok(hist)
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let outer = w.begin_container(HISTORY, 1, self.ident)?;
        if let Some(line) = &self.command_line {
            let h = w.begin_block(HISTORY_COMMAND_LINE, 1, self.ident)?;
            w.put(line.time as i32)?;
            w.put_string(&line.text)?;
            w.end_block(h)?;
        }
        for line in &self.config {
            let h = w.begin_block(HISTORY_CONFIG, 1, self.ident)?;
            w.put(line.time as i32)?;
            w.put_string(&line.text)?;
            w.end_block(h)?;
        }
        w.end_block(outer)
    }
}
