mod common;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use mandrill::backend::Backend;
use mandrill::bytecode::{self, format};
use mandrill::runtime::Io;
use mandrill::vm::{PreparedVM, VM, VmConfig};

fn bench_vm(c: &mut Criterion) {
    for (label, path) in common::workloads() {
        let program = common::load_program(&path);

        c.bench_function(&format!("backend_vm_compile_only_{label}"), |b| {
            b.iter(|| {
                let compiled = bytecode::compile(black_box(&program)).expect("compile");
                black_box(compiled);
            })
        });

        let compiled = bytecode::compile(&program).expect("compile");
        let bytes = format::encode(&compiled).expect("encode");
        c.bench_function(&format!("backend_vm_decode_{label}"), |b| {
            b.iter(|| {
                let decoded = format::decode(black_box(&bytes)).expect("decode");
                black_box(decoded);
            })
        });

        c.bench_function(&format!("backend_vm_execute_prepared_{label}"), |b| {
            let prepared = PreparedVM::load(compiled.clone(), VmConfig::default()).expect("load");
            b.iter(|| {
                let mut io = Io::default();
                prepared.run_with_io(black_box(&mut io)).expect("run compiled");
                black_box(io);
            })
        });

        c.bench_function(&format!("backend_vm_total_{label}"), |b| {
            let vm = VM::new();
            b.iter(|| {
                let output = vm.run(black_box(&program)).expect("run");
                black_box(output);
            })
        });
    }
}

criterion_group!(benches, bench_vm);
criterion_main!(benches);
