//! Nestest-style disassembly tracer: one formatted line per instruction,
//! read without side effects so tracing never perturbs emulated state.

use crate::bus::Bus;
use crate::cpu::{AddressingMode, Cpu};

/// Renders one nestest golden-log line for the instruction at `cpu.pc`,
/// without advancing `cpu` or touching the bus beyond `peek` reads.
pub fn trace_line(cpu: &Cpu, bus: &Bus) -> String {
    let pc = cpu.pc;
    let raw_opcode = bus.peek8(pc);

    let Some((opcode, mode, _)) = crate::cpu::decode_for_trace(raw_opcode) else {
        return format!(
            "{:04x}  {:02x}        .byte ${:02x}                        A:{:02x} X:{:02x} Y:{:02x} P:{:02x} SP:{:02x} CYC:{}",
            pc, raw_opcode, raw_opcode, cpu.a, cpu.x, cpu.y, cpu.status.bits(), cpu.sp, cpu.cycle_count
        );
    };

    let operand_len = operand_length(mode);
    let mut hex_bytes = vec![raw_opcode];
    for i in 1..=operand_len {
        hex_bytes.push(bus.peek8(pc.wrapping_add(i as u16)));
    }

    let operand_text = format_operand(cpu, bus, pc, mode, &hex_bytes);
    let hex_str = hex_bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "{:04x}  {:8} {:>4} {:<27} A:{:02x} X:{:02x} Y:{:02x} P:{:02x} SP:{:02x} CYC:{}",
        pc,
        hex_str,
        format!("{:?}", opcode).to_uppercase(),
        operand_text,
        cpu.a,
        cpu.x,
        cpu.y,
        cpu.status.bits(),
        cpu.sp,
        cpu.cycle_count
    )
}

fn operand_length(mode: AddressingMode) -> usize {
    use AddressingMode::*;
    match mode {
        Implied | Accumulator => 0,
        Immediate | ZeroPage | ZeroPageX | ZeroPageY | IndirectX | IndirectY | Relative => 1,
        Absolute | AbsoluteX | AbsoluteY | Indirect => 2,
    }
}

fn format_operand(cpu: &Cpu, bus: &Bus, pc: u16, mode: AddressingMode, hex: &[u8]) -> String {
    use AddressingMode::*;
    match mode {
        Implied => String::new(),
        Accumulator => "A".to_string(),
        Immediate => format!("#${:02x}", hex[1]),
        ZeroPage => {
            let addr = hex[1] as u16;
            format!("${:02x} = {:02x}", addr, bus.peek8(addr))
        }
        ZeroPageX => {
            let addr = hex[1].wrapping_add(cpu.x) as u16;
            format!("${:02x},X @ {:02x} = {:02x}", hex[1], addr, bus.peek8(addr))
        }
        ZeroPageY => {
            let addr = hex[1].wrapping_add(cpu.y) as u16;
            format!("${:02x},Y @ {:02x} = {:02x}", hex[1], addr, bus.peek8(addr))
        }
        Absolute => {
            let addr = u16::from_le_bytes([hex[1], hex[2]]);
            format!("${:04x} = {:02x}", addr, bus.peek8(addr))
        }
        AbsoluteX => {
            let base = u16::from_le_bytes([hex[1], hex[2]]);
            let addr = base.wrapping_add(cpu.x as u16);
            format!("${:04x},X @ {:04x} = {:02x}", base, addr, bus.peek8(addr))
        }
        AbsoluteY => {
            let base = u16::from_le_bytes([hex[1], hex[2]]);
            let addr = base.wrapping_add(cpu.y as u16);
            format!("${:04x},Y @ {:04x} = {:02x}", base, addr, bus.peek8(addr))
        }
        Indirect => {
            let ptr = u16::from_le_bytes([hex[1], hex[2]]);
            format!("(${:04x})", ptr)
        }
        IndirectX => {
            let zp = hex[1].wrapping_add(cpu.x);
            let addr = bus.peek16(zp as u16);
            format!("(${:02x},X) @ {:02x} = {:04x} = {:02x}", hex[1], zp, addr, bus.peek8(addr))
        }
        IndirectY => {
            let base = bus.peek16(hex[1] as u16);
            let addr = base.wrapping_add(cpu.y as u16);
            format!("(${:02x}),Y = {:04x} @ {:04x} = {:02x}", hex[1], base, addr, bus.peek8(addr))
        }
        Relative => {
            let offset = hex[1] as i8;
            let target = (pc.wrapping_add(2) as i32 + offset as i32) as u16;
            format!("${:04x}", target)
        }
    }
}
