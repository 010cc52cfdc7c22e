//! End-to-end tests for the ECU simulator live under `tests/`.
