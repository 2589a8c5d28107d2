use crate::address::Address;
use crate::arch::i8051::I8051;
use crate::arch::{Architecture, FrameBinder, LoggingHost, PointerScanFlags};
use crate::image::{Image, Segment, SegmentMap};
use crate::machine::{MachineInstruction, Operand};
use crate::rtl::{Expression, InstrClass, Operation, RtlCluster};
use crate::types::DataType;
use crate::Error;
use std::sync::Arc;

fn decode(bytes: &[u8]) -> Vec<MachineInstruction> {
    let arch = I8051::new();
    let image = Image::new(Address::new(0, 16), bytes.to_vec());
    let reader = arch.reader(&image, Address::new(0, 16)).unwrap();
    arch.decoder(reader).collect()
}

fn rewrite(bytes: &[u8]) -> Vec<RtlCluster> {
    let arch = I8051::new();
    let image = Image::new(Address::new(0, 16), bytes.to_vec());
    let reader = arch.reader(&image, Address::new(0, 16)).unwrap();
    let binder = FrameBinder::new();
    let host = LoggingHost::new();
    arch.rewriter(reader, arch.processor_state(), &binder, &host)
        .collect()
}

fn assigned_scalars(cluster: &RtlCluster) -> Vec<String> {
    cluster
        .operations()
        .iter()
        .filter_map(|operation| operation.scalar_written())
        .map(|scalar| scalar.name().to_string())
        .collect()
}

#[test]
fn mov_direct_immediate_consumes_three_bytes() {
    // mov [0x40], #0x01
    let instructions = decode(&[0x75, 0x40, 0x01]);
    assert_eq!(instructions.len(), 1);
    let mov = &instructions[0];
    assert_eq!(mov.mnemonic(), "mov");
    assert_eq!(mov.length(), 3);
    assert_eq!(mov.address(), Address::new(0, 16));
    assert!(matches!(mov.operands()[0], Operand::Memory(_)));
    assert!(matches!(mov.operands()[1], Operand::Immediate(_)));
}

#[test]
fn decoding_always_makes_forward_progress() {
    // A deterministic pseudo-random buffer; decoding must terminate with
    // instruction lengths that sum to the bytes consumed, every length
    // at least one.
    let mut lcg: u32 = 0x1234_5678;
    let bytes: Vec<u8> = (0..256)
        .map(|_| {
            lcg = lcg.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (lcg >> 16) as u8
        })
        .collect();

    let instructions = decode(&bytes);
    assert!(!instructions.is_empty());
    let mut expected = Address::new(0, 16);
    for instruction in &instructions {
        assert!(instruction.length() >= 1);
        assert_eq!(instruction.address(), expected);
        expected = expected.wrapping_offset(instruction.length() as i64);
    }
    assert_eq!(expected.value(), bytes.len() as u64);
}

#[test]
fn truncated_instruction_decodes_invalid_not_empty() {
    // mov direct,#imm cut off after the direct byte.
    let instructions = decode(&[0x75, 0x40]);
    assert_eq!(instructions.len(), 1);
    assert!(!instructions[0].is_valid());
    assert_eq!(instructions[0].length(), 2);
}

#[test]
fn undefined_opcode_is_an_invalid_instruction() {
    let instructions = decode(&[0xA5, 0x00]);
    assert_eq!(instructions.len(), 2);
    assert!(!instructions[0].is_valid());
    assert_eq!(instructions[0].length(), 1);
    assert_eq!(instructions[1].mnemonic(), "nop");
}

#[test]
fn decoding_restarts_at_any_instruction_address() {
    let bytes = [0x74, 0x10, 0x80, 0xFE];
    let arch = I8051::new();
    let image = Image::new(Address::new(0, 16), bytes.to_vec());

    // Re-enter at the second instruction.
    let reader = arch.reader(&image, Address::new(2, 16)).unwrap();
    let instructions: Vec<_> = arch.decoder(reader).collect();
    assert_eq!(instructions.len(), 1);
    assert_eq!(instructions[0].mnemonic(), "sjmp");
    assert_eq!(instructions[0].address(), Address::new(2, 16));
}

#[test]
fn relative_targets_are_next_instruction_relative() {
    // sjmp -2 loops onto itself; jc +4 lands past the next instruction.
    let instructions = decode(&[0x80, 0xFE, 0x40, 0x04]);
    assert_eq!(instructions[0].operands()[0], Operand::Address(Address::new(0, 16)));
    assert_eq!(instructions[1].operands()[0], Operand::Address(Address::new(8, 16)));
}

#[test]
fn ajmp_targets_stay_in_page() {
    // ajmp with opcode high bits 0b111 and low byte 0x23 from address 0.
    let instructions = decode(&[0xE1, 0x23]);
    assert_eq!(
        instructions[0].operands()[0],
        Operand::Address(Address::new(0x0723, 16))
    );
}

#[test]
fn flag_groups_intern_by_mask() {
    let arch = I8051::new();
    let first = arch.flag_group(0b01).unwrap();
    let second = arch.flag_group(0b01).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    // A different mask is a different group.
    let other = arch.flag_group(0b11).unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
}

#[test]
fn flag_group_interning_is_thread_safe() {
    let arch = Arc::new(I8051::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let arch = arch.clone();
            std::thread::spawn(move || arch.flag_group(0b01).unwrap())
        })
        .collect();
    let groups: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    for pair in groups.windows(2) {
        assert!(Arc::ptr_eq(&pair[0], &pair[1]));
    }
}

#[test]
fn flag_group_types_follow_the_mask() {
    let arch = I8051::new();

    let carry = arch.flag_group(0b0000_0001).unwrap();
    assert_eq!(carry.data_type(), DataType::Bool);
    assert_eq!(carry.name(), "C");
    assert_eq!(carry.flag_register().name(), "PSW");

    let group = arch.flag_group(0b0000_0011).unwrap();
    assert_eq!(group.data_type(), DataType::Byte);
    assert_eq!(group.name(), "CH");
}

#[test]
fn grf_to_string_round_trips() {
    let arch = I8051::new();
    for mask in 1u32..=0b1111 {
        let group = arch.flag_group(mask).unwrap();
        assert_eq!(
            arch.grf_to_string(group.mask()).unwrap(),
            arch.grf_to_string(mask).unwrap()
        );
        let by_name = arch.flag_group_by_name(group.name()).unwrap();
        assert!(Arc::ptr_eq(&group, &by_name));
    }
}

#[test]
fn zero_flag_mask_is_an_invariant_violation() {
    let arch = I8051::new();
    assert_eq!(arch.grf_to_string(0), Err(Error::InvalidFlagGroup));
    assert!(matches!(arch.flag_group(0), Err(Error::InvalidFlagGroup)));
}

#[test]
fn address_parse_accepts_what_format_produces() {
    let arch = I8051::new();
    for value in [0u64, 0x40, 0x0723, 0xFFFF] {
        let address = Address::new(value, 16);
        let text = arch.format_address(address);
        assert_eq!(arch.try_parse_address(&text), Some(address));
    }
    assert_eq!(arch.try_parse_address("12345"), None);
    assert_eq!(arch.try_parse_address("0x40"), None);
    assert_eq!(arch.try_parse_address("wxyz"), None);
    assert_eq!(arch.try_parse_address(""), None);
}

#[test]
fn register_lookup_both_directions() {
    let arch = I8051::new();
    let a = arch.register_by_name("A").unwrap();
    assert_eq!(arch.register(a.number()).unwrap().name(), "A");
    assert!(matches!(
        arch.register_by_name("Z80"),
        Err(Error::UnknownRegister(_))
    ));
    assert!(matches!(arch.register(999), Err(Error::UnknownRegister(_))));
    assert_eq!(arch.stack_register().unwrap().name(), "SP");
}

#[test]
fn one_cluster_per_instruction_in_address_order() {
    // mov A,#0x10 ; invalid ; add A,#0x01 ; sjmp -2
    let bytes = [0x74, 0x10, 0xA5, 0x24, 0x01, 0x80, 0xFE];
    let clusters = rewrite(&bytes);
    let instructions = decode(&bytes);

    assert_eq!(clusters.len(), instructions.len());
    for (cluster, instruction) in clusters.iter().zip(&instructions) {
        assert_eq!(cluster.address(), instruction.address());
        assert_eq!(cluster.length(), instruction.length());
        assert_eq!(cluster.class(), instruction.class());
    }
}

#[test]
fn invalid_bytes_rewrite_to_intrinsic_clusters() {
    let clusters = rewrite(&[0xA5]);
    assert_eq!(clusters.len(), 1);
    assert!(clusters[0].class().contains(InstrClass::INVALID));
    assert!(matches!(
        clusters[0].operations()[0],
        Operation::Intrinsic { .. }
    ));
}

#[test]
fn mov_rewrites_to_a_store() {
    let clusters = rewrite(&[0x75, 0x40, 0x01]);
    assert_eq!(clusters.len(), 1);
    let ops = clusters[0].operations();
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        Operation::Store { address, src } => {
            assert_eq!(address.to_string(), "0x40:8");
            assert_eq!(src.to_string(), "0x1:8");
        }
        other => panic!("expected a store, got {}", other),
    }
}

#[test]
fn add_updates_the_flags_explicitly() {
    // add A,#0x01
    let clusters = rewrite(&[0x24, 0x01]);
    let assigned = assigned_scalars(&clusters[0]);
    for flag in ["C", "H", "O", "P"] {
        assert!(
            assigned.iter().any(|name| name == flag),
            "missing assignment to flag {}",
            flag
        );
    }
    // The accumulator itself is written last.
    assert_eq!(assigned.last().map(String::as_str), Some("A"));
}

#[test]
fn conditional_jump_branches_on_the_carry_group() {
    // jc +0
    let clusters = rewrite(&[0x40, 0x00]);
    match &clusters[0].operations()[0] {
        Operation::Branch {
            target,
            condition: Some(condition),
        } => {
            assert_eq!(condition.to_string(), "C:1");
            assert_eq!(target.to_string(), "0x2:16");
        }
        other => panic!("expected a conditional branch, got {}", other),
    }
}

#[test]
fn calls_and_returns() {
    // lcall 0x0123 ; ret
    let clusters = rewrite(&[0x12, 0x01, 0x23, 0x22]);
    assert!(matches!(
        clusters[0].operations()[0],
        Operation::Call { .. }
    ));
    assert!(clusters[0].class().contains(InstrClass::CALL));
    assert_eq!(clusters[1].operations()[0], Operation::Return);
    assert!(clusters[1].class().contains(InstrClass::RETURN));
}

#[test]
fn cjne_sets_carry_and_branches() {
    // cjne A,#0x10,+0
    let clusters = rewrite(&[0xB4, 0x10, 0x00]);
    let ops = clusters[0].operations();
    match &ops[0] {
        Operation::Assign { dst, src } => {
            assert_eq!(dst.name(), "C");
            assert!(matches!(src, Expression::Cmpltu(_, _)));
        }
        other => panic!("expected the carry assignment, got {}", other),
    }
    assert!(matches!(
        ops[1],
        Operation::Branch {
            condition: Some(_),
            ..
        }
    ));
}

#[test]
fn tracked_data_pointer_resolves_indirect_jumps() {
    // mov DPTR,#0x0123 ; jmp @A+DPTR
    let clusters = rewrite(&[0x90, 0x01, 0x23, 0x73]);
    match &clusters[1].operations()[0] {
        Operation::Branch {
            target,
            condition: None,
        } => {
            // DPTR was substituted with its known value; only the
            // accumulator remains symbolic.
            let names: Vec<&str> = target.scalars().iter().map(|s| s.name()).collect();
            assert_eq!(names, vec!["A"]);
            assert!(target.to_string().contains("0x123:16"));
        }
        other => panic!("expected an indirect branch, got {}", other),
    }
}

#[test]
fn untracked_data_pointer_stays_symbolic() {
    let clusters = rewrite(&[0x73]);
    match &clusters[0].operations()[0] {
        Operation::Branch { target, .. } => {
            let names: Vec<&str> = target.scalars().iter().map(|s| s.name()).collect();
            assert!(names.contains(&"DPTR"));
        }
        other => panic!("expected an indirect branch, got {}", other),
    }
}

#[test]
fn stack_access_offsets_the_stack_pointer() {
    let arch = I8051::new();
    let binder = FrameBinder::new();
    let access = arch.stack_access(&binder, 2, DataType::Byte).unwrap();
    assert_eq!(access.data_type(), DataType::Byte);
    let names: Vec<&str> = access
        .effective_address()
        .scalars()
        .iter()
        .map(|s| s.name())
        .collect();
    assert_eq!(names, vec!["SP"]);
}

#[test]
fn read_code_address_is_big_endian() {
    let arch = I8051::new();
    let image = Image::new(Address::new(0, 16), vec![0x01, 0x23]);
    let mut reader = arch.reader(&image, Address::new(0, 16)).unwrap();
    let address = arch
        .read_code_address(16, &mut reader, &arch.processor_state())
        .unwrap();
    assert_eq!(address, Address::new(0x0123, 16));
    assert!(matches!(
        arch.read_code_address(8, &mut reader, &arch.processor_state()),
        Err(Error::Unsupported { .. })
    ));
}

#[test]
fn pointer_scanner_finds_seeded_pointers() {
    let arch = I8051::new();
    // 0x0040 encoded big-endian at offset 2; 0xFEFF points nowhere.
    let image = Image::new(
        Address::new(0, 16),
        vec![0xFE, 0xFF, 0x00, 0x40, 0xFE, 0xFF],
    );
    let mut map = SegmentMap::new();
    map.add_segment(Segment::new("code", Address::new(0, 16), 0x100));

    let reader = arch.reader(&image, Address::new(0, 16)).unwrap();
    let candidates: Vec<Address> = arch
        .pointer_scanner(&map, reader, &[], PointerScanFlags::SEGMENTS)
        .unwrap()
        .collect();
    assert!(candidates.contains(&Address::new(2, 16)));

    // Seeding by known address only.
    let reader = arch.reader(&image, Address::new(0, 16)).unwrap();
    let known = [Address::new(0xFEFF, 16)];
    let candidates: Vec<Address> = arch
        .pointer_scanner(&map, reader, &known, PointerScanFlags::KNOWN)
        .unwrap()
        .collect();
    assert_eq!(candidates, vec![Address::new(0, 16), Address::new(4, 16)]);
}

#[test]
fn push_pop_use_the_stack_register() {
    // push [0x40] ; pop [0x40]
    let clusters = rewrite(&[0xC0, 0x40, 0xD0, 0x40]);
    let push_assigned = assigned_scalars(&clusters[0]);
    assert!(push_assigned.iter().any(|name| name == "SP"));
    assert!(clusters[0]
        .operations()
        .iter()
        .any(|op| matches!(op, Operation::Store { .. })));
    assert!(clusters[1]
        .operations()
        .iter()
        .any(|op| matches!(op, Operation::Load { .. })));
}

#[test]
fn setb_carry_assigns_the_flag_group() {
    // setb C
    let clusters = rewrite(&[0xD3]);
    match &clusters[0].operations()[0] {
        Operation::Assign { dst, src } => {
            assert_eq!(dst.name(), "C");
            assert_eq!(src.to_string(), "0x1:1");
        }
        other => panic!("expected a flag assignment, got {}", other),
    }
}

#[test]
fn djnz_decrements_then_branches() {
    // djnz R2,-2
    let clusters = rewrite(&[0xDA, 0xFE]);
    let ops = clusters[0].operations();
    assert!(matches!(ops[0], Operation::Assign { .. }));
    let wrote: Vec<_> = assigned_scalars(&clusters[0]);
    assert!(wrote.iter().any(|name| name == "R2"));
    assert!(matches!(
        ops.last().unwrap(),
        Operation::Branch {
            condition: Some(_),
            ..
        }
    ));
}
