//! Flash command sequences driven through CPU writes

use super::*;
use crate::memory::{break_kind, FlashState, WideAddr, PAGE_SIZE};

const PAGE4: usize = 4 * PAGE_SIZE;

fn unlock(cpu: &mut Cpu, command: u8) {
    cpu.mem_write(0x4AAA, 0xAA);
    cpu.mem_write(0x4555, 0x55);
    cpu.mem_write(0x4AAA, command);
}

fn invalid_counter(cpu: &mut Cpu) -> Rc<Cell<u32>> {
    let count = Rc::new(Cell::new(0));
    cpu.set_hook(HookKind::InvalidFlash, Some(counting_hook(&count)));
    count
}

#[test]
fn test_locked_flash_rejects_writes() {
    let mut cpu = flash_cpu();
    cpu.mem.flash_locked = true;
    let invalid = invalid_counter(&mut cpu);

    // LD (HL),0AAh with HL in the flash bank
    cpu.hl = 0x4AAA;
    load(&mut cpu, 0, &[0x36, 0xAA]);
    cpu.step();

    assert_eq!(invalid.get(), 1);
    assert_eq!(cpu.mem.flash_state, FlashState::Read);
    assert!(cpu.mem.flash().as_slice().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_program_through_bus() {
    let mut cpu = flash_cpu();
    let invalid = invalid_counter(&mut cpu);

    unlock(&mut cpu, 0xA0);
    assert_eq!(cpu.mem.flash_state, FlashState::Program);
    cpu.mem_write(0x4123, 0x3C);

    assert_eq!(cpu.mem.flash_state, FlashState::Read);
    assert_eq!(cpu.mem.flash().get(PAGE4 + 0x123), 0x3C);
    assert_eq!(cpu.mem_read(0x4123), 0x3C);
    assert_eq!(invalid.get(), 0);
}

#[test]
fn test_chip_erase_through_bus() {
    let mut cpu = flash_cpu();
    unlock(&mut cpu, 0xA0);
    cpu.mem_write(0x4000, 0x00);
    cpu.mem.flash_mut().set(0x10, 0x12);
    assert_eq!(cpu.mem.flash().get(PAGE4), 0x00);

    unlock(&mut cpu, 0x80);
    cpu.mem_write(0x4AAA, 0xAA);
    cpu.mem_write(0x4555, 0x55);
    cpu.mem_write(0x4AAA, 0x10);

    assert_eq!(cpu.mem.flash_state, FlashState::Read);
    assert!(cpu.mem.flash().as_slice().iter().all(|&b| b == 0xFF));
}

#[test]
fn test_autoselect_is_repeatable() {
    let mut cpu = flash_cpu();
    let invalid = invalid_counter(&mut cpu);

    for _ in 0..3 {
        unlock(&mut cpu, 0x90);
        assert_eq!(cpu.mem.flash_state, FlashState::Autoselect);
        assert_eq!(cpu.mem_read(0x4000), 0x01);
        assert_eq!(cpu.mem_read(0x4000), 0x01);
        assert_eq!(cpu.mem_read(0x4002), 0xDA);
    }
    assert_eq!(invalid.get(), 0);

    cpu.mem_write(0x4000, 0xF0);
    assert_eq!(cpu.mem.flash_state, FlashState::Read);
    assert_eq!(cpu.mem_read(0x4000), 0xFF);
}

#[test]
fn test_out_of_sequence_write_fires_hook() {
    let mut cpu = flash_cpu();
    let invalid = invalid_counter(&mut cpu);

    cpu.mem_write(0x4AAA, 0xAA);
    cpu.mem_write(0x4123, 0x12);

    assert_eq!(invalid.get(), 1);
    assert_eq!(cpu.mem.flash_state, FlashState::Read);
    assert_eq!(cpu.mem.flash().get(PAGE4 + 0x123), 0xFF);
}

#[test]
fn test_read_mid_command_aborts() {
    let mut cpu = flash_cpu();
    let invalid = invalid_counter(&mut cpu);

    unlock(&mut cpu, 0xA0);
    assert_eq!(cpu.mem_read(0x4000), 0xFF);
    assert_eq!(invalid.get(), 1);
    assert_eq!(cpu.mem.flash_state, FlashState::Read);
}

#[test]
fn test_program_hits_write_breakpoint() {
    let mut cpu = flash_cpu();
    let writes = Rc::new(Cell::new(0));
    cpu.set_hook(HookKind::MemWriteBreak, Some(counting_hook(&writes)));
    cpu.mem
        .set_break(WideAddr::new(4, 0x0200, false), break_kind::MEM_WRITE);

    unlock(&mut cpu, 0xA0);
    cpu.mem_write(0x4200, 0x7F);
    assert_eq!(writes.get(), 1);

    // Erasing the sector passes over the same byte once
    unlock(&mut cpu, 0x80);
    cpu.mem_write(0x4AAA, 0xAA);
    cpu.mem_write(0x4555, 0x55);
    cpu.mem_write(0x4000, 0x30);
    assert_eq!(writes.get(), 2);
    assert_eq!(cpu.mem.flash().get(PAGE4 + 0x200), 0xFF);
}

#[test]
fn test_fetch_goes_through_sequencer() {
    let mut cpu = flash_cpu();
    unlock(&mut cpu, 0x90);

    // Opcode fetch from flash in autoselect sees the manufacturer id
    cpu.pc = 0x4000;
    cpu.step();
    assert_eq!(cpu.bus, 0x01);
    assert_eq!(cpu.mem.flash_state, FlashState::Autoselect);
}
