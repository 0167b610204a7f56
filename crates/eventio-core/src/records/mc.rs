// crates/eventio-core/src/records/mc.rs

use std::io::Write;

use crate::block::{Block, BlockWriter};
use crate::error::{EventIoError, Result};
use crate::records::types::{MC_EVENT, MC_PE_SUM, MC_SHOWER};
use crate::records::{check_block, WithTelescopeId};

/// Simulated air shower (block 2020, ident = shower number).
///
/// Layout: primary_id:i32 energy:f32 azimuth:f32 altitude:f32
/// depth_start:f32 h_first_int:f32 xmax:f32 hmax:f32
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McShower {
    pub shower_num: i32,
    pub primary_id: i32,
    pub energy: f32,
    pub azimuth: f32,
    pub altitude: f32,
    pub depth_start: f32,
    pub h_first_int: f32,
    pub xmax: f32,
    pub hmax: f32,
}

impl McShower {
    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, MC_SHOWER, 2)?;
        let mut c = block.cursor();
        Ok(Self {
            shower_num: block.ident() as i32,
            primary_id: c.get()?,
            energy: c.get()?,
            azimuth: c.get()?,
            altitude: c.get()?,
            depth_start: c.get()?,
            h_first_int: c.get()?,
            xmax: c.get()?,
            hmax: c.get()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(MC_SHOWER, 2, self.shower_num as i64)?;
        w.put(self.primary_id)?;
        w.put(self.energy)?;
        w.put(self.azimuth)?;
        w.put(self.altitude)?;
        w.put(self.depth_start)?;
        w.put(self.h_first_int)?;
        w.put(self.xmax)?;
        w.put(self.hmax)?;
        w.end_block(h)
    }

    /// Both inputs must have simulated the same shower.
    pub fn same_shower(&self, other: &McShower) -> bool {
        self.shower_num == other.shower_num
            && self.primary_id == other.primary_id
            && self.energy == other.energy
            && self.azimuth == other.azimuth
            && self.altitude == other.altitude
    }
}

/// One use of a shower with a specific core position (block 2021,
/// ident = event number).
///
/// Layout: shower_num:i32 xcore:f32 ycore:f32 aweight:f32
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McEvent {
    pub event: i32,
    pub shower_num: i32,
    pub xcore: f32,
    pub ycore: f32,
    pub aweight: f32,
}

impl McEvent {
    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, MC_EVENT, 2)?;
        let mut c = block.cursor();
        Ok(Self {
            event: block.ident() as i32,
            shower_num: c.get()?,
            xcore: c.get()?,
            ycore: c.get()?,
            aweight: c.get()?,
        })
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(MC_EVENT, 2, self.event as i64)?;
        w.put(self.shower_num)?;
        w.put(self.xcore)?;
        w.put(self.ycore)?;
        w.put(self.aweight)?;
        w.end_block(h)
    }

    pub fn same_core(&self, other: &McEvent) -> bool {
        self.event == other.event && self.xcore == other.xcore && self.ycore == other.ycore
    }
}

/// Photo-electron sums of one telescope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelPeSum {
    pub tel_id: i32,
    pub num_pe: i32,
    pub pix_pe: Vec<u32>,
    pub photons: f32,
    pub photons_atm: f32,
    pub photons_atm_3_6: f32,
    pub photons_atm_qe: f32,
    pub photons_atm_400: f32,
}

impl TelPeSum {
    pub fn empty(tel_id: i32) -> Self {
        Self {
            tel_id,
            ..Self::default()
        }
    }
}

impl WithTelescopeId for TelPeSum {
    fn telescope_id(&self) -> i32 {
        self.tel_id
    }

    fn with_telescope_id(&self, tel_id: i32) -> Self {
        Self {
            tel_id,
            num_pe: self.num_pe,
            pix_pe: self.pix_pe.clone(),
            photons: self.photons,
            photons_atm: self.photons_atm,
            photons_atm_3_6: self.photons_atm_3_6,
            photons_atm_qe: self.photons_atm_qe,
            photons_atm_400: self.photons_atm_400,
        }
    }
}

/// Photo-electron sums per telescope (block 2026, ident = event number).
///
/// Layout: shower_num:i32 ntel:count
/// { tel_id:scount num_pe:i32 npix:count pix_pe:count[npix]
///   photons:f32 photons_atm:f32 photons_atm_3_6:f32 photons_atm_qe:f32
///   photons_atm_400:f32 }*ntel
#[derive(Clone, Debug, Default, PartialEq)]
pub struct McPeSum {
    pub event: i32,
    pub shower_num: i32,
    pub tels: Vec<TelPeSum>,
}

impl McPeSum {
    pub fn read(block: &Block) -> Result<Self> {
        check_block(block, MC_PE_SUM, 2)?;
        let mut c = block.cursor();
        let shower_num = c.get::<i32>()?;
        let ntel = c.get_count32()? as usize;
        if ntel > c.remaining() {
            return Err(EventIoError::Format(format!(
                "p.e. sum for event {} lists {} telescopes in {} bytes",
                block.ident(),
                ntel,
                c.remaining()
            )));
        }
        let mut tels = Vec::with_capacity(ntel);
        for _ in 0..ntel {
            let tel_id = c.get_scount32()?;
            let num_pe = c.get::<i32>()?;
            let npix = c.get_count32()? as usize;
            if npix > c.remaining() {
                return Err(EventIoError::Format(format!(
                    "p.e. sum for event {} telescope {} lists {} pixels in {} bytes",
                    block.ident(),
                    tel_id,
                    npix,
                    c.remaining()
                )));
            }
            let pix_pe = (0..npix)
                .map(|_| c.get_count32())
                .collect::<Result<Vec<_>>>()?;
            tels.push(TelPeSum {
                tel_id,
                num_pe,
                pix_pe,
                photons: c.get()?,
                photons_atm: c.get()?,
                photons_atm_3_6: c.get()?,
                photons_atm_qe: c.get()?,
                photons_atm_400: c.get()?,
            });
        }
        Ok(Self {
            event: block.ident() as i32,
            shower_num,
            tels,
        })
    }

    pub fn write<W: Write>(&self, w: &mut BlockWriter<W>) -> Result<()> {
        let h = w.begin_block(MC_PE_SUM, 2, self.event as i64)?;
        w.put(self.shower_num)?;
        w.put_count(self.tels.len() as u64)?;
        for t in &self.tels {
            w.put_scount(t.tel_id as i64)?;
            w.put(t.num_pe)?;
            w.put_count(t.pix_pe.len() as u64)?;
            for &pe in &t.pix_pe {
                w.put_count(pe as u64)?;
            }
            w.put(t.photons)?;
            w.put(t.photons_atm)?;
            w.put(t.photons_atm_3_6)?;
            w.put(t.photons_atm_qe)?;
            w.put(t.photons_atm_400)?;
        }
        w.end_block(h)
    }
}
