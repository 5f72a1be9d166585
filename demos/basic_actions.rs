//! Basic action compilation and evaluation
//!
//! Demonstrates: declare → compile → drive
//!
//! Run with:
//! ```bash
//! cargo run --example basic_actions
//! ```

use std::collections::HashMap;

use hrr_action_compiler::prelude::*;

fn main() -> Result<()> {
    // 1. Declare modules inside a construction context
    let mut net = Network::with_seed(7);
    net.declare_module("vision", 64)?;
    net.declare_module("memory", 64)?;
    net.declare_module("motor", 128)?;

    // 2. Compile action rules against the declared modules
    let plan = Actions::new([
        "memory = vision * Role + 0.5 * Cue",
        "motor = translate(vision, populate=True)",
    ])
    .build(&mut net)?;

    println!("compiled {} targets", plan.len());
    for target in plan.targets() {
        for spec in plan.connections(target) {
            println!(
                "  {} <- {} (weight {:.2})",
                target,
                kind(spec),
                spec.weight
            );
        }
    }

    // 3. Drive the plan with a vocabulary vector, noiselessly
    let vocab = net.module("vision")?.vocabulary();
    let thing = vocab.write().parse("Thing")?;
    let mut inputs = HashMap::new();
    inputs.insert("vision".to_string(), thing);

    let memory_in = plan.drive("memory", &inputs)?;
    let expected = vocab.write().parse("Thing*Role + 0.5*Cue")?;
    println!("memory similarity: {:.3}", memory_in.cosine(&expected)?);

    // The translation registered vision's symbols into motor's vocabulary.
    let motor_vocab = net.module("motor")?.vocabulary();
    println!("motor vocabulary now knows: {:?}", motor_vocab.read().names());

    net.freeze();
    Ok(())
}

fn kind(spec: &ConnectionSpec) -> &'static str {
    match &spec.source {
        SignalSource::Constant(_) => "constant drive",
        SignalSource::Module(tap) if tap.transform.is_none() => "direct route",
        SignalSource::Module(_) => "transformed route",
        SignalSource::BindingNetwork { .. } => "binding network",
    }
}
