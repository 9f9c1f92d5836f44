//! Foreign render bridge
//!
//! Some sounds are rendered by an external, pre-compiled engine that lives in
//! its own address space (a WebAssembly module here). A render call is an
//! owned-buffer handoff:
//!
//! 1. allocate `frames * 4` bytes in the engine's memory
//! 2. call the engine's render function with (pointer, sample rate, frames)
//! 3. copy the floats out into an owned [`SampleBuffer`]
//! 4. free the region, on every exit path
//!
//! [`ScratchRegion`] ties step 4 to `Drop`, so errors in steps 2 and 3 can
//! never leak engine memory.

use crate::{AudioError, Result};
use drumhit_core::{SampleBuffer, SoundId};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc};

/// Size of one rendered sample in engine memory
const FLOAT_BYTES: usize = std::mem::size_of::<f32>();

/// Name of the engine function that renders `sound`
pub fn render_function(sound: &str) -> String {
    format!("render_{}", sound)
}

/// Gain applied after copy-out. Snare renders hot, so it is halved.
pub fn default_gain(sound: &str) -> f32 {
    match sound {
        SoundId::SNARE => 0.5,
        SoundId::KICK => 1.0,
        _ => 0.8,
    }
}

/// Capabilities of an external render engine
pub trait RenderEngine: Send {
    /// Allocate `bytes` in the engine's memory. `Ok(None)` is a null handle.
    fn allocate(&mut self, bytes: usize) -> Result<Option<u32>>;

    /// Run `function`, which writes `frames` floats starting at `ptr`
    fn invoke(&mut self, function: &str, ptr: u32, sample_rate: u32, frames: usize) -> Result<()>;

    /// Release a region returned by [`RenderEngine::allocate`]
    fn free(&mut self, ptr: u32) -> Result<()>;

    /// Copy `frames` floats out of engine memory
    fn read_floats(&self, ptr: u32, frames: usize) -> Result<Vec<f32>>;

    /// Whether the engine exports `function`
    fn has_function(&self, function: &str) -> bool;
}

/// A region of engine memory, freed when dropped
pub struct ScratchRegion<'a, E: RenderEngine + ?Sized> {
    engine: &'a mut E,
    ptr: u32,
    frames: usize,
}

impl<'a, E: RenderEngine + ?Sized> ScratchRegion<'a, E> {
    /// Allocate room for `frames` floats on behalf of `sound`
    ///
    /// A null handle is an [`AudioError::AllocationFailure`]; reading from it
    /// would return garbage.
    pub fn allocate(engine: &'a mut E, sound: &SoundId, frames: usize) -> Result<Self> {
        let bytes = frames * FLOAT_BYTES;
        match engine.allocate(bytes)? {
            Some(ptr) if ptr != 0 => Ok(ScratchRegion { engine, ptr, frames }),
            _ => Err(AudioError::AllocationFailure {
                sound: sound.clone(),
                bytes,
            }),
        }
    }

    pub fn ptr(&self) -> u32 {
        self.ptr
    }

    /// Fill the region by calling `function` in the engine
    pub fn render(&mut self, function: &str, sample_rate: u32) -> Result<()> {
        self.engine.invoke(function, self.ptr, sample_rate, self.frames)
    }

    /// Copy the region into owned memory
    pub fn read(&self) -> Result<Vec<f32>> {
        self.engine.read_floats(self.ptr, self.frames)
    }
}

impl<E: RenderEngine + ?Sized> Drop for ScratchRegion<'_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.engine.free(self.ptr) {
            warn!(ptr = self.ptr, error = %err, "failed to release render scratch region");
        }
    }
}

/// Shared handle to a render engine
///
/// The engine is locked for a whole allocate/render/copy/free cycle, and
/// every cycle allocates its own region, so concurrent renders never touch
/// the same scratch pointer.
#[derive(Clone)]
pub struct ForeignRenderer {
    engine: Arc<Mutex<dyn RenderEngine>>,
}

impl ForeignRenderer {
    pub fn new<E: RenderEngine + 'static>(engine: E) -> Self {
        ForeignRenderer {
            engine: Arc::new(Mutex::new(engine)),
        }
    }

    /// Render `frames` frames of `sound` through `function` and apply `gain`
    pub fn render(
        &self,
        sound: &SoundId,
        function: &str,
        sample_rate: u32,
        frames: usize,
        gain: f32,
    ) -> Result<SampleBuffer> {
        if frames == 0 {
            return Ok(SampleBuffer::new(Vec::new(), sample_rate));
        }

        let mut engine = self.engine.lock();
        if !engine.has_function(function) {
            return Err(AudioError::Engine(format!("engine does not export {}", function)));
        }
        let samples = {
            let mut region = ScratchRegion::allocate(&mut *engine, sound, frames)?;
            debug!(sound = %sound, function, ptr = region.ptr(), frames, "foreign render");
            region.render(function, sample_rate)?;
            region.read()?
        };

        Ok(SampleBuffer::new(samples, sample_rate).scaled(gain))
    }
}

fn engine_error(context: &str, err: impl fmt::Display) -> AudioError {
    AudioError::Engine(format!("{}: {:#}", context, err))
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| AudioError::Engine(format!("{} {} does not fit in i32", what, value)))
}

/// Render engine compiled to WebAssembly
///
/// The module must export `memory`, `malloc(i32) -> i32`, `free(i32)` and one
/// `render_<sound>(ptr: i32, sample_rate: i32, frames: i32)` per sound.
/// Imports the module declares but nothing provides trap when called.
pub struct WasmRenderEngine {
    store: Store<()>,
    instance: Instance,
    memory: Memory,
    malloc: TypedFunc<i32, i32>,
    free: TypedFunc<i32, ()>,
    functions: HashSet<String>,
}

impl WasmRenderEngine {
    /// Load a compiled `.wasm` or `.wat` text module from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::from_file(&engine, path.as_ref())
            .map_err(|e| engine_error(&format!("failed to load {}", path.as_ref().display()), e))?;
        Self::instantiate(&engine, &module)
    }

    /// Load a module from memory (binary or text format)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(|e| engine_error("failed to compile module", e))?;
        Self::instantiate(&engine, &module)
    }

    fn instantiate(engine: &Engine, module: &Module) -> Result<Self> {
        let mut store = Store::new(engine, ());
        let mut linker = Linker::new(engine);
        linker
            .define_unknown_imports_as_traps(module)
            .map_err(|e| engine_error("failed to stub imports", e))?;

        let instance = linker
            .instantiate(&mut store, module)
            .map_err(|e| engine_error("failed to instantiate module", e))?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| AudioError::Engine("module does not export memory".to_string()))?;
        let malloc = instance
            .get_typed_func::<i32, i32>(&mut store, "malloc")
            .map_err(|e| engine_error("missing malloc export", e))?;
        let free = instance
            .get_typed_func::<i32, ()>(&mut store, "free")
            .map_err(|e| engine_error("missing free export", e))?;

        let functions = module
            .exports()
            .filter(|export| export.ty().func().is_some())
            .map(|export| export.name().to_string())
            .collect();

        Ok(WasmRenderEngine {
            store,
            instance,
            memory,
            malloc,
            free,
            functions,
        })
    }

    /// Exported `render_*` functions, by the sound they render
    pub fn sounds(&self) -> Vec<SoundId> {
        let mut sounds: Vec<SoundId> = self
            .functions
            .iter()
            .filter_map(|name| name.strip_prefix("render_"))
            .map(SoundId::from)
            .collect();
        sounds.sort();
        sounds
    }
}

impl RenderEngine for WasmRenderEngine {
    fn allocate(&mut self, bytes: usize) -> Result<Option<u32>> {
        let ptr = self
            .malloc
            .call(&mut self.store, to_i32(bytes, "allocation size")?)
            .map_err(|e| engine_error("malloc trapped", e))?;
        Ok(match ptr {
            0 => None,
            ptr => Some(ptr as u32),
        })
    }

    fn invoke(&mut self, function: &str, ptr: u32, sample_rate: u32, frames: usize) -> Result<()> {
        let render = self
            .instance
            .get_typed_func::<(i32, i32, i32), ()>(&mut self.store, function)
            .map_err(|e| engine_error(&format!("missing render function {}", function), e))?;
        render
            .call(
                &mut self.store,
                (
                    ptr as i32,
                    to_i32(sample_rate as usize, "sample rate")?,
                    to_i32(frames, "frame count")?,
                ),
            )
            .map_err(|e| engine_error(&format!("{} trapped", function), e))
    }

    fn free(&mut self, ptr: u32) -> Result<()> {
        self.free
            .call(&mut self.store, ptr as i32)
            .map_err(|e| engine_error("free trapped", e))
    }

    fn read_floats(&self, ptr: u32, frames: usize) -> Result<Vec<f32>> {
        let mut bytes = vec![0u8; frames * FLOAT_BYTES];
        self.memory
            .read(&self.store, ptr as usize, &mut bytes)
            .map_err(|e| AudioError::Engine(format!("render region out of bounds: {}", e)))?;
        Ok(bytes
            .chunks_exact(FLOAT_BYTES)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn has_function(&self, function: &str) -> bool {
        self.functions.contains(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bump allocator that rewinds once every region is freed, plus a
    /// render_snare that writes a constant 0.8
    const DRUMS_WAT: &str = r#"
        (module
            (memory (export "memory") 4)
            (global $next (mut i32) (i32.const 1024))
            (global $live (mut i32) (i32.const 0))
            (func (export "malloc") (param $size i32) (result i32)
                (local $ptr i32)
                (local.set $ptr (global.get $next))
                (global.set $next (i32.add (global.get $next) (local.get $size)))
                (global.set $live (i32.add (global.get $live) (i32.const 1)))
                (local.get $ptr))
            (func (export "free") (param $ptr i32)
                (global.set $live (i32.sub (global.get $live) (i32.const 1)))
                (if (i32.eqz (global.get $live))
                    (then (global.set $next (i32.const 1024)))))
            (func (export "render_snare") (param $out i32) (param $rate i32) (param $frames i32)
                (local $i i32)
                (block $done
                    (loop $fill
                        (br_if $done (i32.ge_s (local.get $i) (local.get $frames)))
                        (f32.store
                            (i32.add (local.get $out) (i32.mul (local.get $i) (i32.const 4)))
                            (f32.const 0.8))
                        (local.set $i (i32.add (local.get $i) (i32.const 1)))
                        (br $fill))))
            (func (export "render_kick") (param $out i32) (param $rate i32) (param $frames i32)
                unreachable))
    "#;

    const NULL_ALLOC_WAT: &str = r#"
        (module
            (memory (export "memory") 1)
            (func (export "malloc") (param i32) (result i32) (i32.const 0))
            (func (export "free") (param i32))
            (func (export "render_snare") (param i32 i32 i32)))
    "#;

    /// Engine double that records allocations and can fail on demand
    #[derive(Default)]
    struct CountingEngine {
        allocated: usize,
        freed: usize,
        null_alloc: bool,
        fail_invoke: bool,
        fail_read: bool,
    }

    impl RenderEngine for CountingEngine {
        fn allocate(&mut self, _bytes: usize) -> Result<Option<u32>> {
            if self.null_alloc {
                return Ok(None);
            }
            self.allocated += 1;
            Ok(Some(64))
        }

        fn invoke(&mut self, function: &str, _ptr: u32, _rate: u32, _frames: usize) -> Result<()> {
            if self.fail_invoke {
                return Err(AudioError::Engine(format!("{} trapped", function)));
            }
            Ok(())
        }

        fn free(&mut self, _ptr: u32) -> Result<()> {
            self.freed += 1;
            Ok(())
        }

        fn read_floats(&self, _ptr: u32, frames: usize) -> Result<Vec<f32>> {
            if self.fail_read {
                return Err(AudioError::Engine("read failed".into()));
            }
            Ok(vec![1.0; frames])
        }

        fn has_function(&self, _function: &str) -> bool {
            true
        }
    }

    fn snare() -> SoundId {
        SoundId::from("snare")
    }

    #[test]
    fn test_region_freed_after_render() {
        let mut engine = CountingEngine::default();
        {
            let mut region = ScratchRegion::allocate(&mut engine, &snare(), 16).unwrap();
            region.render("render_snare", 44100).unwrap();
            assert_eq!(region.read().unwrap().len(), 16);
        }
        assert_eq!((engine.allocated, engine.freed), (1, 1));
    }

    #[test]
    fn test_region_freed_when_invoke_fails() {
        let mut engine = CountingEngine {
            fail_invoke: true,
            ..Default::default()
        };
        let result = {
            let mut region = ScratchRegion::allocate(&mut engine, &snare(), 16).unwrap();
            region.render("render_snare", 44100)
        };
        assert!(result.is_err());
        assert_eq!(engine.freed, 1);
    }

    #[test]
    fn test_renderer_frees_when_copy_fails() {
        let renderer = ForeignRenderer::new(CountingEngine {
            fail_read: true,
            ..Default::default()
        });
        let err = renderer.render(&snare(), "render_snare", 44100, 32, 0.5).unwrap_err();
        assert!(matches!(err, AudioError::Engine(_)));
        // Lock is released, so a second render can proceed
        assert!(renderer.render(&snare(), "render_snare", 44100, 32, 0.5).is_err());
    }

    #[test]
    fn test_null_handle_is_allocation_failure() {
        let mut engine = CountingEngine {
            null_alloc: true,
            ..Default::default()
        };
        let err = ScratchRegion::allocate(&mut engine, &snare(), 100).err().unwrap();
        match err {
            AudioError::AllocationFailure { sound, bytes } => {
                assert_eq!(sound, snare());
                assert_eq!(bytes, 400);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(engine.freed, 0);
    }

    #[test]
    fn test_wasm_render_applies_gain() {
        let wasm = wat::parse_str(DRUMS_WAT).unwrap();
        let renderer = ForeignRenderer::new(WasmRenderEngine::from_bytes(&wasm).unwrap());
        let buffer = renderer
            .render(&snare(), "render_snare", 44100, 11025, default_gain("snare"))
            .unwrap();
        assert_eq!(buffer.frames(), 11025);
        assert!(buffer.samples().iter().all(|s| (s - 0.4).abs() < 1e-6));

        // Repeated renders fit because every region was released
        for _ in 0..20 {
            renderer.render(&snare(), "render_snare", 44100, 11025, 1.0).unwrap();
        }
    }

    #[test]
    fn test_wasm_trap_is_reported() {
        let wasm = wat::parse_str(DRUMS_WAT).unwrap();
        let renderer = ForeignRenderer::new(WasmRenderEngine::from_bytes(&wasm).unwrap());
        let err = renderer.render(&SoundId::from("kick"), "render_kick", 44100, 64, 1.0).unwrap_err();
        assert!(matches!(err, AudioError::Engine(_)));
        assert!(renderer.render(&snare(), "render_snare", 44100, 64, 1.0).is_ok());
    }

    #[test]
    fn test_wasm_null_allocation() {
        let engine = WasmRenderEngine::from_bytes(NULL_ALLOC_WAT.as_bytes()).unwrap();
        let renderer = ForeignRenderer::new(engine);
        let err = renderer.render(&snare(), "render_snare", 44100, 64, 1.0).unwrap_err();
        assert!(matches!(err, AudioError::AllocationFailure { .. }));
    }

    #[test]
    fn test_missing_export_is_reported() {
        let wasm = wat::parse_str(DRUMS_WAT).unwrap();
        let renderer = ForeignRenderer::new(WasmRenderEngine::from_bytes(&wasm).unwrap());
        let err = renderer.render(&SoundId::from("tom"), "render_tom", 44100, 64, 1.0).unwrap_err();
        assert!(matches!(err, AudioError::Engine(_)));
    }

    #[test]
    fn test_exported_sounds() {
        let wasm = wat::parse_str(DRUMS_WAT).unwrap();
        let engine = WasmRenderEngine::from_bytes(&wasm).unwrap();
        assert_eq!(engine.sounds(), vec![SoundId::from("kick"), SoundId::from("snare")]);
        assert!(engine.has_function("render_snare"));
        assert!(!engine.has_function("render_tom"));
    }

    #[test]
    fn test_default_gains() {
        assert_eq!(default_gain("snare"), 0.5);
        assert_eq!(default_gain("kick"), 1.0);
        assert_eq!(default_gain("clap"), 0.8);
        assert_eq!(render_function("snare"), "render_snare");
    }
}
