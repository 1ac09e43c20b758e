// tinyscope: replay a tinyalloc session against the simulated debuggee

use crossterm::style::Stylize;
use tinyscope::config::InspectorConfig;
use tinyscope::heap::HeapSnapshotFormatter;
use tinyscope::session::value::Value;
use tinyscope::session::{FrameSymbol, StopEvent, ThreadId};
use tinyscope::sim::constants::HEAP_ADDRESS_START;
use tinyscope::sim::{SimulatedProcess, TinyallocImage};
use tinyscope::tracer::CallPairTracer;
use tracing_subscriber::EnvFilter;

fn deliver(tracer: &mut CallPairTracer, process: &mut SimulatedProcess, stop: Option<StopEvent>) {
    let Some(stop) = stop else {
        return;
    };
    if let Some(line) = tracer.handle_stop(process, &stop).line() {
        println!("{}", line.green());
    }
}

fn size_arg(size: u64) -> Vec<FrameSymbol> {
    vec![FrameSymbol::argument("num", Value::Size(size))]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = InspectorConfig::default();
    let formatter = HeapSnapshotFormatter::new(config.clone());
    let mut tracer = CallPairTracer::new(&config);

    eprintln!("Laying out a tinyalloc heap at 0x{:x}...", HEAP_ADDRESS_START);
    let mut image = TinyallocImage::new(HEAP_ADDRESS_START, 0x1000, 6)?;
    tracer.attach(image.process_mut())?;

    let main_thread = ThreadId(1);
    println!("{}", format!("== trace {} ==", tracer.function()).bold());

    // A plain call
    let stop = image.process_mut().call(main_thread, "ta_alloc", size_arg(16))?;
    deliver(&mut tracer, image.process_mut(), stop);
    let first = image.carve(16, b"alpha\0")?;
    let stop = image.process_mut().ret(main_thread, Value::pointer(first))?;
    deliver(&mut tracer, image.process_mut(), stop);

    // A nested call: the inner activation returns and reports first
    let stop = image.process_mut().call(main_thread, "ta_alloc", size_arg(100))?;
    deliver(&mut tracer, image.process_mut(), stop);
    let stop = image.process_mut().call(main_thread, "ta_alloc", size_arg(50))?;
    deliver(&mut tracer, image.process_mut(), stop);
    let inner = image.carve(50, b"inner\0")?;
    let stop = image.process_mut().ret(main_thread, Value::pointer(inner))?;
    deliver(&mut tracer, image.process_mut(), stop);
    let outer = image.carve(100, b"outer\x01\xff\0")?;
    let stop = image.process_mut().ret(main_thread, Value::pointer(outer))?;
    deliver(&mut tracer, image.process_mut(), stop);

    image.release(first)?;

    println!();
    println!("{}", "== heap ==".bold());
    match formatter.dump(image.process()) {
        Ok(text) => print!("{}", text),
        Err(e) => println!("{}", e.annotation().red()),
    }

    let abandoned = tracer.detach(image.process_mut())?;
    eprintln!("Tracer detached ({} call(s) abandoned).", abandoned);

    let stop = image.process_mut().exit(0);
    deliver(&mut tracer, image.process_mut(), Some(stop));

    Ok(())
}
