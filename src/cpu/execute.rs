use super::addressing::{AddressingMode, Operand};
use super::opcode::Opcode;
use super::{Cpu, StatusFlags, IRQ_BRK_VECTOR};
use crate::bus::Bus;
use crate::error::Error;

/// Reads the byte an `Operand` names, whether that's an address to load from
/// or a value already resolved (Immediate/Accumulator/Relative).
fn load(cpu: &mut Cpu, bus: &mut Bus, operand: Operand) -> u8 {
    match operand {
        Operand::Address(addr) => bus.read8(addr),
        Operand::Value(v) => v,
        Operand::None => unreachable!("instruction with no operand tried to load a value"),
    }
}

fn address_of(operand: Operand, opcode: Opcode) -> Result<u16, Error> {
    match operand {
        Operand::Address(addr) => Ok(addr),
        _ => Err(Error::BadAddressing { opcode: opcode as u8 }),
    }
}

/// Executes the semantics of one decoded instruction. `instruction_pc` is the
/// address the opcode byte itself was fetched from, needed only by branches
/// (page-cross is measured from the branch instruction's own page, not from
/// wherever `cpu.pc` has advanced to after reading the offset byte).
pub fn execute(
    cpu: &mut Cpu,
    bus: &mut Bus,
    opcode: Opcode,
    mode: AddressingMode,
    operand: Operand,
    instruction_pc: u16,
) -> Result<(), Error> {
    use Opcode::*;
    match opcode {
        Adc => adc(cpu, bus, operand),
        Sbc => sbc(cpu, bus, operand),
        And => logical(cpu, bus, operand, |a, m| a & m),
        Eor => logical(cpu, bus, operand, |a, m| a ^ m),
        Ora => logical(cpu, bus, operand, |a, m| a | m),
        Asl => shift(cpu, bus, mode, operand, opcode, true),
        Lsr => shift(cpu, bus, mode, operand, opcode, false),
        Rol => rotate(cpu, bus, mode, operand, opcode, true),
        Ror => rotate(cpu, bus, mode, operand, opcode, false),
        Bit => bit(cpu, bus, operand),
        Bpl => branch(cpu, !cpu.status.contains(StatusFlags::NEGATIVE), operand, instruction_pc),
        Bmi => branch(cpu, cpu.status.contains(StatusFlags::NEGATIVE), operand, instruction_pc),
        Bvc => branch(cpu, !cpu.status.contains(StatusFlags::OVERFLOW), operand, instruction_pc),
        Bvs => branch(cpu, cpu.status.contains(StatusFlags::OVERFLOW), operand, instruction_pc),
        Bcc => branch(cpu, !cpu.status.contains(StatusFlags::CARRY), operand, instruction_pc),
        Bcs => branch(cpu, cpu.status.contains(StatusFlags::CARRY), operand, instruction_pc),
        Bne => branch(cpu, !cpu.status.contains(StatusFlags::ZERO), operand, instruction_pc),
        Beq => branch(cpu, cpu.status.contains(StatusFlags::ZERO), operand, instruction_pc),
        Brk => brk(cpu, bus, operand),
        Cmp => compare(cpu, bus, cpu.a, operand),
        Cpx => compare(cpu, bus, cpu.x, operand),
        Cpy => compare(cpu, bus, cpu.y, operand),
        Dec => bump_memory(cpu, bus, operand, opcode, -1),
        Inc => bump_memory(cpu, bus, operand, opcode, 1),
        Clc => {
            cpu.status.remove(StatusFlags::CARRY);
            Ok(())
        }
        Sec => {
            cpu.status.insert(StatusFlags::CARRY);
            Ok(())
        }
        Cli => {
            cpu.status.remove(StatusFlags::INT_DISABLE);
            Ok(())
        }
        Sei => {
            cpu.status.insert(StatusFlags::INT_DISABLE);
            Ok(())
        }
        Clv => {
            cpu.status.remove(StatusFlags::OVERFLOW);
            Ok(())
        }
        Cld => {
            cpu.status.remove(StatusFlags::DECIMAL);
            Ok(())
        }
        Sed => {
            cpu.status.insert(StatusFlags::DECIMAL);
            Ok(())
        }
        Jmp => {
            cpu.pc = address_of(operand, opcode)?;
            Ok(())
        }
        Jsr => {
            let target = address_of(operand, opcode)?;
            let return_addr = cpu.pc.wrapping_sub(1);
            cpu.push16(bus, return_addr);
            cpu.pc = target;
            Ok(())
        }
        Rts => {
            cpu.pc = cpu.pop16(bus).wrapping_add(1);
            Ok(())
        }
        Rti => {
            let status_bits = cpu.pop8(bus);
            cpu.status = StatusFlags::from_bits_truncate(status_bits);
            cpu.status.insert(StatusFlags::UNUSED);
            cpu.status.remove(StatusFlags::BREAK);
            cpu.pc = cpu.pop16(bus);
            Ok(())
        }
        Lda => {
            let v = load(cpu, bus, operand);
            cpu.a = v;
            cpu.status.set_zero_negative(v);
            Ok(())
        }
        Ldx => {
            let v = load(cpu, bus, operand);
            cpu.x = v;
            cpu.status.set_zero_negative(v);
            Ok(())
        }
        Ldy => {
            let v = load(cpu, bus, operand);
            cpu.y = v;
            cpu.status.set_zero_negative(v);
            Ok(())
        }
        Sta => {
            let addr = address_of(operand, opcode)?;
            bus.write8(addr, cpu.a)?;
            Ok(())
        }
        Stx => {
            let addr = address_of(operand, opcode)?;
            bus.write8(addr, cpu.x)?;
            Ok(())
        }
        Sty => {
            let addr = address_of(operand, opcode)?;
            bus.write8(addr, cpu.y)?;
            Ok(())
        }
        Tax => {
            cpu.x = cpu.a;
            cpu.status.set_zero_negative(cpu.x);
            Ok(())
        }
        Txa => {
            cpu.a = cpu.x;
            cpu.status.set_zero_negative(cpu.a);
            Ok(())
        }
        Tay => {
            cpu.y = cpu.a;
            cpu.status.set_zero_negative(cpu.y);
            Ok(())
        }
        Tya => {
            cpu.a = cpu.y;
            cpu.status.set_zero_negative(cpu.a);
            Ok(())
        }
        Tsx => {
            cpu.x = cpu.sp;
            cpu.status.set_zero_negative(cpu.x);
            Ok(())
        }
        Txs => {
            cpu.sp = cpu.x;
            Ok(())
        }
        Dex => {
            cpu.x = cpu.x.wrapping_sub(1);
            cpu.status.set_zero_negative(cpu.x);
            Ok(())
        }
        Inx => {
            cpu.x = cpu.x.wrapping_add(1);
            cpu.status.set_zero_negative(cpu.x);
            Ok(())
        }
        Dey => {
            cpu.y = cpu.y.wrapping_sub(1);
            cpu.status.set_zero_negative(cpu.y);
            Ok(())
        }
        Iny => {
            cpu.y = cpu.y.wrapping_add(1);
            cpu.status.set_zero_negative(cpu.y);
            Ok(())
        }
        Pha => {
            cpu.push8(bus, cpu.a);
            Ok(())
        }
        Pla => {
            let v = cpu.pop8(bus);
            cpu.a = v;
            cpu.status.set_zero_negative(v);
            Ok(())
        }
        Php => {
            // The pushed byte always has BREAK and UNUSED set; this is a quirk
            // of the physical pin, not a reflection of live CPU state.
            let pushed = (cpu.status | StatusFlags::BREAK | StatusFlags::UNUSED).bits();
            cpu.push8(bus, pushed);
            Ok(())
        }
        Plp => {
            let bits = cpu.pop8(bus);
            cpu.status = StatusFlags::from_bits_truncate(bits);
            cpu.status.insert(StatusFlags::UNUSED);
            cpu.status.remove(StatusFlags::BREAK);
            Ok(())
        }
        Nop => Ok(()),
    }
}

fn adc(cpu: &mut Cpu, bus: &mut Bus, operand: Operand) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    add_to_accumulator(cpu, m);
    Ok(())
}

/// SBC is ADC with the operand's one's complement, which falls straight out
/// of the carry-borrow relationship `A - M - (1-C) == A + !M + C`.
fn sbc(cpu: &mut Cpu, bus: &mut Bus, operand: Operand) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    add_to_accumulator(cpu, !m);
    Ok(())
}

fn add_to_accumulator(cpu: &mut Cpu, m: u8) {
    let carry_in = cpu.status.contains(StatusFlags::CARRY) as u16;
    let a = cpu.a;
    let sum = a as u16 + m as u16 + carry_in;
    let result = sum as u8;

    cpu.status.set(StatusFlags::CARRY, sum > 0xFF);
    let overflow = (a ^ result) & (m ^ result) & 0x80 != 0;
    cpu.status.set(StatusFlags::OVERFLOW, overflow);
    cpu.status.set_zero_negative(result);
    cpu.a = result;
}

fn logical(cpu: &mut Cpu, bus: &mut Bus, operand: Operand, f: impl Fn(u8, u8) -> u8) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    cpu.a = f(cpu.a, m);
    cpu.status.set_zero_negative(cpu.a);
    Ok(())
}

fn bit(cpu: &mut Cpu, bus: &mut Bus, operand: Operand) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    cpu.status.set(StatusFlags::ZERO, (cpu.a & m) == 0);
    cpu.status.set(StatusFlags::OVERFLOW, m & 0x40 != 0);
    cpu.status.set(StatusFlags::NEGATIVE, m & 0x80 != 0);
    Ok(())
}

fn compare(cpu: &mut Cpu, bus: &mut Bus, register: u8, operand: Operand) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    let result = register.wrapping_sub(m);
    cpu.status.set(StatusFlags::CARRY, register >= m);
    cpu.status.set_zero_negative(result);
    Ok(())
}

fn shift(
    cpu: &mut Cpu,
    bus: &mut Bus,
    mode: AddressingMode,
    operand: Operand,
    opcode: Opcode,
    left: bool,
) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    let (result, carry_out) = if left { (m << 1, m & 0x80 != 0) } else { (m >> 1, m & 0x01 != 0) };
    cpu.status.set(StatusFlags::CARRY, carry_out);
    cpu.status.set_zero_negative(result);
    store_back(cpu, bus, mode, operand, opcode, result)
}

fn rotate(
    cpu: &mut Cpu,
    bus: &mut Bus,
    mode: AddressingMode,
    operand: Operand,
    opcode: Opcode,
    left: bool,
) -> Result<(), Error> {
    let m = load(cpu, bus, operand);
    let carry_in = cpu.status.contains(StatusFlags::CARRY) as u8;
    let (result, carry_out) = if left {
        ((m << 1) | carry_in, m & 0x80 != 0)
    } else {
        ((m >> 1) | (carry_in << 7), m & 0x01 != 0)
    };
    cpu.status.set(StatusFlags::CARRY, carry_out);
    cpu.status.set_zero_negative(result);
    store_back(cpu, bus, mode, operand, opcode, result)
}

fn store_back(
    cpu: &mut Cpu,
    bus: &mut Bus,
    mode: AddressingMode,
    operand: Operand,
    opcode: Opcode,
    result: u8,
) -> Result<(), Error> {
    if mode == AddressingMode::Accumulator {
        cpu.a = result;
        Ok(())
    } else {
        let addr = address_of(operand, opcode)?;
        bus.write8(addr, result)
    }
}

fn bump_memory(cpu: &mut Cpu, bus: &mut Bus, operand: Operand, opcode: Opcode, delta: i8) -> Result<(), Error> {
    let addr = address_of(operand, opcode)?;
    let m = bus.read8(addr);
    let result = m.wrapping_add(delta as u8);
    cpu.status.set_zero_negative(result);
    bus.write8(addr, result)
}

fn branch(cpu: &mut Cpu, condition: bool, operand: Operand, instruction_pc: u16) -> Result<(), Error> {
    if condition {
        let offset = match operand {
            Operand::Value(v) => v as i8,
            _ => unreachable!("Relative addressing always yields Operand::Value"),
        };
        let target = cpu.pc.wrapping_add(offset as i16 as u16);
        cpu.branch_taken = true;
        // Page-cross is measured from the branch instruction's own page, not
        // from cpu.pc (already advanced past the offset byte).
        cpu.page_crossed = (instruction_pc & 0xFF00) != (target & 0xFF00);
        cpu.pc = target;
    }
    Ok(())
}

/// Full software-interrupt sequence: pushes `pc` and status (with BREAK and
/// UNUSED set), raises INT_DISABLE, and loads `pc` from the shared IRQ/BRK
/// vector. `operand` is the signature byte following the BRK opcode, kept
/// for test harnesses (e.g. nestest) that inspect it after a trap.
fn brk(cpu: &mut Cpu, bus: &mut Bus, operand: Operand) -> Result<(), Error> {
    if let Operand::Value(v) = operand {
        cpu.last_brk_operand = v;
    }
    cpu.push16(bus, cpu.pc);
    let pushed = (cpu.status | StatusFlags::BREAK | StatusFlags::UNUSED).bits();
    cpu.push8(bus, pushed);
    cpu.status.insert(StatusFlags::INT_DISABLE);
    cpu.pc = bus.read16(IRQ_BRK_VECTOR);
    Ok(())
}

/// Cycle extras beyond an instruction's tabulated base: +1 for a page
/// boundary crossed while computing an effective address, and +1 (or +2 if
/// the branch itself crosses a page) for a taken branch.
pub fn extra_cycles(opcode: Opcode, mode: AddressingMode, page_crossed: bool, branch_taken: bool) -> u8 {
    use Opcode::*;
    if matches!(opcode, Bpl | Bmi | Bvc | Bvs | Bcc | Bcs | Bne | Beq) {
        return match (branch_taken, page_crossed) {
            (true, true) => 2,
            (true, false) => 1,
            (false, _) => 0,
        };
    }

    // STA/shifts/RMW instructions always take their tabulated worst case and
    // never get a page-cross discount; only the read-only addressing modes do.
    let reads_only = matches!(
        opcode,
        Adc | And | Cmp | Eor | Lda | Ldx | Ldy | Ora | Sbc
    );
    if reads_only && page_crossed && matches!(mode, AddressingMode::AbsoluteX | AddressingMode::AbsoluteY | AddressingMode::IndirectY) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;

    fn test_bus() -> Bus {
        Bus::new(Cartridge::blank())
    }

    #[test]
    fn adc_sets_carry_and_overflow_on_signed_overflow() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.a = 0x50;
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Adc, AddressingMode::Immediate, Operand::Value(0x50), pc).unwrap();
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.status.contains(StatusFlags::OVERFLOW));
        assert!(!cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn sbc_borrows_when_carry_clear() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.a = 0x00;
        cpu.status.remove(StatusFlags::CARRY);
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Sbc, AddressingMode::Immediate, Operand::Value(0x01), pc).unwrap();
        assert_eq!(cpu.a, 0xFE);
        assert!(!cpu.status.contains(StatusFlags::CARRY));
    }

    #[test]
    fn brk_pushes_pc_and_status_then_jumps_to_vector() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        bus.write8(IRQ_BRK_VECTOR, 0x00).unwrap();
        bus.write8(IRQ_BRK_VECTOR + 1, 0x90).unwrap();
        cpu.pc = 0x1235;
        cpu.sp = 0xFD;
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Brk, AddressingMode::Implied, Operand::None, pc).unwrap();
        assert_eq!(cpu.pc, 0x9000);
        assert!(cpu.status.contains(StatusFlags::INT_DISABLE));
        let pushed_status = bus.peek8(0x01FD);
        assert_eq!(pushed_status & 0b0011_0000, 0b0011_0000);
        assert_eq!(bus.peek16(0x01FE), 0x1235);
    }

    #[test]
    fn nop_touches_nothing() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        let before = cpu;
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Nop, AddressingMode::Implied, Operand::None, pc).unwrap();
        assert_eq!(cpu.a, before.a);
        assert_eq!(cpu.pc, before.pc);
        assert_eq!(cpu.status, before.status);
    }

    #[test]
    fn jsr_then_rts_round_trips_pc() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.pc = 0x8003;
        cpu.sp = 0xFD;
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Jsr, AddressingMode::Absolute, Operand::Address(0x9000), pc).unwrap();
        assert_eq!(cpu.pc, 0x9000);
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Rts, AddressingMode::Implied, Operand::None, pc).unwrap();
        assert_eq!(cpu.pc, 0x8003);
    }

    #[test]
    fn branch_taken_across_page_adds_two_cycles() {
        let mut cpu = Cpu::new();
        cpu.pc = 0x80FE;
        execute_branch_and_check(&mut cpu, 0x10);
        assert_eq!(extra_cycles(Opcode::Bpl, AddressingMode::Relative, cpu.page_crossed, cpu.branch_taken), 2);
    }

    fn execute_branch_and_check(cpu: &mut Cpu, offset: u8) {
        let mut bus = test_bus();
        let instruction_pc = cpu.pc;
        cpu.status.remove(StatusFlags::NEGATIVE);
        execute(cpu, &mut bus, Opcode::Bpl, AddressingMode::Relative, Operand::Value(offset), instruction_pc).unwrap();
    }

    #[test]
    fn cmp_sets_carry_when_register_greater_or_equal() {
        let mut cpu = Cpu::new();
        let mut bus = test_bus();
        cpu.a = 0x10;
        let pc = cpu.pc;
        execute(&mut cpu, &mut bus, Opcode::Cmp, AddressingMode::Immediate, Operand::Value(0x10), pc).unwrap();
        assert!(cpu.status.contains(StatusFlags::CARRY));
        assert!(cpu.status.contains(StatusFlags::ZERO));
    }
}
