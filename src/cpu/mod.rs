//! The 6502-variant CPU core: registers, reset/power-on, and the
//! fetch-decode-execute step loop.

mod addressing;
mod execute;
mod opcode;

pub use addressing::AddressingMode;
pub use opcode::{decode as decode_for_trace, Opcode};

use bitflags::bitflags;
use log::{debug, trace, warn};

use crate::bus::Bus;
use crate::error::Error;

const STACK_BASE: u16 = 0x0100;
const RESET_VECTOR: u16 = 0xFFFC;

/// Shared by hardware IRQ and software BRK; this core never raises the
/// former (no PPU/APU interrupt source is wired up) but BRK uses it.
pub(crate) const IRQ_BRK_VECTOR: u16 = 0xFFFE;

/// Unofficial STP opcode, the one "illegal" opcode this core implements: it
/// halts the CPU cleanly instead of performing any further fetches.
pub const STP_OPCODE: u8 = 0xDB;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const CARRY       = 0b0000_0001;
        const ZERO        = 0b0000_0010;
        const INT_DISABLE = 0b0000_0100;
        const DECIMAL     = 0b0000_1000;
        const BREAK       = 0b0001_0000;
        const UNUSED      = 0b0010_0000;
        const OVERFLOW    = 0b0100_0000;
        const NEGATIVE    = 0b1000_0000;
    }
}

impl StatusFlags {
    fn set_zero_negative(&mut self, value: u8) {
        self.set(StatusFlags::ZERO, value == 0);
        self.set(StatusFlags::NEGATIVE, value & 0x80 != 0);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Cpu {
    pub pc: u16,
    pub sp: u8,
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub status: StatusFlags,
    pub halted: bool,
    pub last_brk_operand: u8,
    pub cycle_count: u64,

    // Side channel set by addressing-mode resolution, consumed by the cycle
    // count at the end of `step`. Mirrors how real hardware's extra read
    // cycle depends on whether the effective address crossed a page.
    page_crossed: bool,
    branch_taken: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Power-on state: all registers zeroed, `sp` and `status` set per the
    /// documented 6502 reset values. `pc` is left at zero until `reset` is
    /// called against a bus (the CPU alone has no vector to read).
    pub fn new() -> Self {
        Cpu {
            pc: 0,
            sp: 0,
            a: 0,
            x: 0,
            y: 0,
            status: StatusFlags::UNUSED,
            halted: false,
            last_brk_operand: 0,
            cycle_count: 0,
            page_crossed: false,
            branch_taken: false,
        }
    }

    /// Power-on sequence: zero the registers and RAM-backed bus state, then
    /// run the same vector load as `reset`.
    pub fn power_on(bus: &mut Bus) -> Self {
        let mut cpu = Cpu::new();
        cpu.sp = 0;
        cpu.reset(bus);
        cpu
    }

    /// Warm reset: reloads `pc` from the RESET vector, backs `sp` off by
    /// three (matching hardware, which neither zeroes nor preserves it
    /// outright), sets the interrupt-disable flag, and clears `halted`.
    /// Does not touch RAM, unlike `power_on`.
    pub fn reset(&mut self, bus: &mut Bus) {
        self.sp = self.sp.wrapping_sub(3);
        self.status.insert(StatusFlags::INT_DISABLE);
        self.status.insert(StatusFlags::UNUSED);
        self.pc = bus.read16(RESET_VECTOR);
        self.halted = false;
        debug!("reset: pc={:04x} sp={:02x} p={:02x}", self.pc, self.sp, self.status.bits());
    }

    pub fn push8(&mut self, bus: &mut Bus, value: u8) {
        let _ = bus.write8(STACK_BASE | self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    pub fn pop8(&mut self, bus: &mut Bus) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read8(STACK_BASE | self.sp as u16)
    }

    pub fn push16(&mut self, bus: &mut Bus, value: u16) {
        self.push8(bus, (value >> 8) as u8);
        self.push8(bus, (value & 0xFF) as u8);
    }

    pub fn pop16(&mut self, bus: &mut Bus) -> u16 {
        let lo = self.pop8(bus) as u16;
        let hi = self.pop8(bus) as u16;
        (hi << 8) | lo
    }

    fn fetch8(&mut self, bus: &mut Bus) -> u8 {
        let byte = bus.read8(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    /// Executes exactly one instruction and returns the number of cycles it
    /// took, including page-cross and taken-branch extras. A no-op returning
    /// `Ok(0)` once `halted` (from STP) so callers can just loop on `step`.
    pub fn step(&mut self, bus: &mut Bus) -> Result<u8, Error> {
        if self.halted {
            return Ok(0);
        }

        let instruction_pc = self.pc;
        let raw_opcode = self.fetch8(bus);

        if raw_opcode == STP_OPCODE {
            warn!("STP at {:04x}: halting", instruction_pc);
            self.halted = true;
            return Ok(1);
        }

        let (opcode, mode, base_cycles) = opcode::decode(raw_opcode).ok_or(Error::UnsupportedInstruction {
            opcode: raw_opcode,
            pc: instruction_pc,
        })?;

        self.page_crossed = false;
        self.branch_taken = false;

        let operand = addressing::resolve(self, bus, mode);
        execute::execute(self, bus, opcode, mode, operand, instruction_pc)?;

        let extra = execute::extra_cycles(opcode, mode, self.page_crossed, self.branch_taken);
        let total = base_cycles + extra;
        self.cycle_count += total as u64;
        trace!(
            "{:04x}  {:02x}  {:?} {:?}  A:{:02x} X:{:02x} Y:{:02x} P:{:02x} SP:{:02x} cyc={}",
            instruction_pc, raw_opcode, opcode, mode, self.a, self.x, self.y, self.status.bits(), self.sp, total
        );
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn bus_with_reset_vector(target: u16) -> Bus {
        let mut bus = Bus::new(Cartridge::blank());
        bus.write8(RESET_VECTOR, (target & 0xFF) as u8).unwrap();
        bus.write8(RESET_VECTOR + 1, (target >> 8) as u8).unwrap();
        bus
    }

    #[test]
    fn reset_reads_vector_and_sets_power_on_flags() {
        let mut bus = bus_with_reset_vector(0x1234);
        let cpu = Cpu::power_on(&mut bus);
        assert_eq!(cpu.pc, 0x1234);
        assert_eq!(cpu.sp, 0xFD);
        assert_eq!(cpu.status.bits(), 0x24);
    }

    #[test]
    fn stack_round_trips_u8_and_u16() {
        let mut bus = bus_with_reset_vector(0x8000);
        let mut cpu = Cpu::power_on(&mut bus);
        let start_sp = cpu.sp;
        cpu.push8(&mut bus, 0x7E);
        assert_eq!(cpu.pop8(&mut bus), 0x7E);
        assert_eq!(cpu.sp, start_sp);

        cpu.push16(&mut bus, 0xBEEF);
        assert_eq!(cpu.pop16(&mut bus), 0xBEEF);
        assert_eq!(cpu.sp, start_sp);
    }

    #[test]
    fn stack_pointer_wraps_on_overflow() {
        let mut bus = bus_with_reset_vector(0x8000);
        let mut cpu = Cpu::power_on(&mut bus);
        cpu.sp = 0x00;
        cpu.push8(&mut bus, 0x11);
        assert_eq!(cpu.sp, 0xFF);
        assert_eq!(bus.peek8(0x0100), 0x11);
    }

    #[test]
    fn stp_halts_and_step_becomes_noop() {
        let mut bus = bus_with_reset_vector(0x8000);
        bus.write8(0x8000, STP_OPCODE).unwrap();
        let mut cpu = Cpu::power_on(&mut bus);
        cpu.step(&mut bus).unwrap();
        assert!(cpu.halted);
        assert_eq!(cpu.step(&mut bus).unwrap(), 0);
    }

    #[test]
    fn unsupported_opcode_is_fatal() {
        let mut bus = bus_with_reset_vector(0x8000);
        bus.write8(0x8000, 0x02).unwrap(); // not in the official set
        let mut cpu = Cpu::power_on(&mut bus);
        assert_eq!(
            cpu.step(&mut bus),
            Err(Error::UnsupportedInstruction { opcode: 0x02, pc: 0x8000 })
        );
    }
}
