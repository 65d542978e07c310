use crate::artifact::{ModuleHandle, ResourceHandle};
use crate::lifecycle::Lifecycle;
use crate::loader::{Factory, LoadError, Loaded, Loader};
use crate::physics::{Body, System};

/// Builds the host lifecycle whose entry point runs `loader` once.
///
/// Every summary line of the loaded artifacts is handed to `report`. A load
/// failure is left to the lifecycle's unhandled-failure path.
pub fn artifact_lifecycle<MF, RF>(
    loader: Loader<MF, RF>,
    report: impl Fn(&str) + 'static,
) -> Lifecycle
where
    MF: Factory<Output = ModuleHandle> + 'static,
    RF: Factory<Output = ResourceHandle> + 'static,
{
    let mut lifecycle = Lifecycle::new();
    lifecycle.on_content_ready(move || async move {
        let loaded = loader.load().await?;
        for line in describe_loaded(&loaded) {
            report(&line);
        }
        Ok::<(), LoadError>(())
    });
    lifecycle
}

pub fn describe_loaded(loaded: &Loaded<ModuleHandle, ResourceHandle>) -> Vec<String> {
    let module = &loaded.module;
    let resource = &loaded.resource;
    let mut lines = vec![format!(
        "Loaded module {} ({} bytes, {} sections, {} exports)",
        module.label(),
        module.len(),
        module.sections().len(),
        module.exports().len()
    )];
    for export in module.exports() {
        lines.push(format!(" - export {} ({:?})", export.name, export.kind));
    }
    lines.push(format!(
        "Loaded resource {} ({} bytes)",
        resource.label(),
        resource.len()
    ));
    lines
}

pub fn format_body(body: &Body) -> String {
    format!(
        " - {} pos=({:.6e}, {:.6e}) vel=({:.6e}, {:.6e})",
        body.name, body.position.x, body.position.y, body.velocity.x, body.velocity.y
    )
}

pub fn print_final_state(system: &System) {
    println!("Final body states:");
    for body in system.bodies() {
        println!("{}", format_body(body));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::DVec2;
    use pollster::block_on;

    use crate::lifecycle::Dispatch;

    fn module_bytes() -> Vec<u8> {
        let mut bytes = b"\0asm\x01\x00\x00\x00".to_vec();
        bytes.extend_from_slice(&[1, 4, 1, 0x60, 0, 0]);
        bytes.extend_from_slice(&[3, 2, 1, 0]);
        bytes.extend_from_slice(&[7, 8, 1, 4]);
        bytes.extend_from_slice(b"step");
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(&[10, 4, 1, 2, 0, 0x0b]);
        bytes
    }

    #[test]
    fn body_line_uses_scientific_notation() {
        let body = Body::new("planet", 1.0, DVec2::new(5.0, 0.0), DVec2::new(0.0, 0.0025));
        assert_eq!(
            format_body(&body),
            " - planet pos=(5.000000e0, 0.000000e0) vel=(0.000000e0, 2.500000e-3)"
        );
    }

    #[test]
    fn loaded_summary_lists_exports() {
        let loaded = Loaded {
            module: ModuleHandle::from_bytes("sim.wasm", module_bytes()).unwrap(),
            resource: ResourceHandle::from_bytes("sim.bin", vec![0; 16]).unwrap(),
        };
        assert_eq!(
            describe_loaded(&loaded),
            vec![
                "Loaded module sim.wasm (34 bytes, 4 sections, 1 exports)".to_string(),
                " - export step (Function)".to_string(),
                "Loaded resource sim.bin (16 bytes)".to_string(),
            ]
        );
    }

    #[test]
    fn artifact_lifecycle_reports_each_line_once() {
        let lines = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&lines);
        let loader = Loader::new(
            || async { ModuleHandle::from_bytes("sim.wasm", module_bytes()) },
            || async { ResourceHandle::from_bytes("sim.bin", vec![0; 4]) },
        );
        let mut lifecycle =
            artifact_lifecycle(loader, move |line| sink.borrow_mut().push(line.to_string()));

        assert!(matches!(block_on(lifecycle.signal_content_ready()), Dispatch::Completed));
        assert!(matches!(block_on(lifecycle.signal_content_ready()), Dispatch::AlreadyFired));
        assert_eq!(lines.borrow().len(), 3);
        assert_eq!(lines.borrow()[2], "Loaded resource sim.bin (4 bytes)");
    }

    #[test]
    fn artifact_lifecycle_surfaces_load_failures() {
        let loader = Loader::new(
            || async { ModuleHandle::from_bytes("sim.wasm", module_bytes()) },
            || async { ResourceHandle::from_bytes("sim.bin", Vec::new()) },
        );
        let mut lifecycle = artifact_lifecycle(loader, |line| panic!("unexpected report: {line}"));
        match block_on(lifecycle.signal_content_ready()) {
            Dispatch::Failed(err) => assert_eq!(err.label(), "sim.bin"),
            other => panic!("expected a failed dispatch, got {other:?}"),
        }
    }
}
