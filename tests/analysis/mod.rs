mod tests_reads;
mod tests_scheduler;
