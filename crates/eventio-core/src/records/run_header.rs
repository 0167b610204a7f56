// crates/eventio-core/src/records/run_header.rs

use std::io::Write;

use crate::block::{Block, BlockWriter, ItemCursor};
use crate::error::{EventIoError, Result};
use crate::records::types::RUN_HEADER;
use crate::records::{check_block, HTime};

const VERSION: u16 = 2;

/// Run-level configuration (block 2000, ident = run number).
///
/// Layout:
/// time:HTime run_type:i32 tracking_mode:i32 reverse_flag:i32
/// direction:f32[2] offset_fov:f32[2] conv_depth:f32 conv_ref_pos:f32[2]
/// ntel:count { tel_id:scount pos:f32[3] }*ntel
/// min_tel_trig:i32 duration:i32 target:string observer:string
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunHeader {
    pub run: i32,
    pub time: HTime,
    pub run_type: i32,
    pub tracking_mode: i32,
    pub reverse_flag: i32,
    pub direction: [f32; 2],
    pub offset_fov: [f32; 2],
    pub conv_depth: f32,
    pub conv_ref_pos: [f32; 2],
    pub tel_ids: Vec<i32>,
    pub tel_pos: Vec<[f32; 3]>,
    pub min_tel_trig: i32,
    pub duration: i32,
    pub target: String,
    pub observer: String,
}

impl RunHeader {
    pub fn num_tel(&self) -> usize {
        self.tel_ids.len()
    }

    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, RUN_HEADER, VERSION)?;
        let mut c = block.cursor();
        let run = block.ident() as i32;
        Self::read_body(&mut c, run)
    }

    fn read_body(c: &mut ItemCursor<'_>, run: i32) -> Result<Self> {
        let time = HTime::read(c)?;
        let run_type = c.get::<i32>()?;
        let tracking_mode = c.get::<i32>()?;
        let reverse_flag = c.get::<i32>()?;
        let direction = [c.get::<f32>()?, c.get::<f32>()?];
        let offset_fov = [c.get::<f32>()?, c.get::<f32>()?];
        let conv_depth = c.get::<f32>()?;
        let conv_ref_pos = [c.get::<f32>()?, c.get::<f32>()?];

        let ntel = c.get_count32()? as usize;
        if ntel.saturating_mul(13) > c.remaining() {
            return Err(EventIoError::Format(format!(
                "run {} header lists {} telescopes but has only {} bytes left",
                run,
                ntel,
                c.remaining()
            )));
        }
        let mut tel_ids = Vec::with_capacity(ntel);
        let mut tel_pos = Vec::with_capacity(ntel);
        for _ in 0..ntel {
            tel_ids.push(c.get_scount32()?);
            tel_pos.push([c.get::<f32>()?, c.get::<f32>()?, c.get::<f32>()?]);
        }

        Ok(Self {
            run,
            time,
            run_type,
            tracking_mode,
            reverse_flag,
            direction,
            offset_fov,
            conv_depth,
            conv_ref_pos,
            tel_ids,
            tel_pos,
            min_tel_trig: c.get::<i32>()?,
            duration: c.get::<i32>()?,
            target: c.get_string()?,
            observer: c.get_string()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        if self.tel_ids.len() != self.tel_pos.len() {
            return Err(EventIoError::Internal(format!(
                "run {} header has {} telescope ids but {} positions",
                self.run,
                self.tel_ids.len(),
                self.tel_pos.len()
            )));
        }
        let h = w.begin_block(RUN_HEADER, VERSION, self.run as i64)?;
        self.time.write(w)?;
        w.put(self.run_type)?;
        w.put(self.tracking_mode)?;
        w.put(self.reverse_flag)?;
        w.put_slice(&self.direction)?;
        w.put_slice(&self.offset_fov)?;
        w.put(self.conv_depth)?;
        w.put_slice(&self.conv_ref_pos)?;
        w.put_count(self.tel_ids.len() as u64)?;
        for (id, pos) in self.tel_ids.iter().zip(&self.tel_pos) {
            w.put_scount(*id as i64)?;
            w.put_slice(pos)?;
        }
        w.put(self.min_tel_trig)?;
        w.put(self.duration)?;
        w.put_string(&self.target)?;
        w.put_string(&self.observer)?;
        w.end_block(h)
    }

    /// First core configuration field in which `other` differs, rendered
    /// as `(name, ours, theirs)`. Time and trigger multiplicity are not
    /// part of the core configuration.
    pub fn core_mismatch(&self, other: &RunHeader) -> Option<(&'static str, String, String)> {
        macro_rules! cmp {
            ($($field:ident),*) => {
                $(
                    if self.$field != other.$field {
                        return Some((
                            stringify!($field),
                            format!("{:?}", self.$field),
                            format!("{:?}", other.$field),
                        ));
                    }
                )*
            };
        }
        cmp!(
            run,
            run_type,
            tracking_mode,
            reverse_flag,
            direction,
            offset_fov,
            conv_depth,
            conv_ref_pos
        );
        None
    }
}
