// Licensed under the Apache-2.0 license

//! End-to-end scenarios run against the simulated controller.

mod functional;
