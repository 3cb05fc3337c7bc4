//! # ASIM-Core
//!
//! Simulador de máquina de registradores para ensino de assembly.
//!
//! > *"Um passo de cada vez: toda instrução termina antes da próxima começar."*
//!
//! ## O Modelo
//!
//! 1. Sete registradores gerais (`r0`–`r6`), `SP`, `PC` e três flags
//! 2. Memória plana de células numéricas; a pilha cresce do topo para baixo
//! 3. Quatro registradores vetoriais (`v0`–`v3`) de 4 lanes `f64`
//! 4. Largura de registrador de 8, 16 ou 32 bits
//!
//! ## Módulos
//!
//! - [`vm`]: loader, estado da máquina, handlers e engine
//! - [`prelude`]: re-exportações convenientes
//!
//! ## Quick Start
//!
//! ```
//! use asim_core::prelude::*;
//!
//! let mut engine = Engine::new();
//! engine
//!     .load_program("
//!         MOV r0, 5
//!     loop:
//!         ADD r1, r0
//!         DEC r0
//!         JNZ loop
//!     END")
//!     .unwrap();
//!
//! engine.run().unwrap();
//! assert_eq!(engine.register(Register::R1), 15);
//! ```

pub mod prelude;
pub mod vm;
